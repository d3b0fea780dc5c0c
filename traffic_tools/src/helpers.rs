use rand::{distributions::Alphanumeric, Rng};

/// Derives the upstream sub-user name for an order: `u` followed by the last ten alphanumeric characters of the
/// order number.
pub fn sub_user_name(order_no: &str) -> String {
    let alnum = order_no.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<Vec<char>>();
    let start = alnum.len().saturating_sub(10);
    let tail = alnum[start..].iter().collect::<String>();
    format!("u{tail}")
}

/// An 8-character lowercase alphanumeric password for a new sub-user.
pub fn random_password() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(8).map(|b| char::from(b).to_ascii_lowercase()).collect()
}

/// Customers paste full proxy usernames that carry a routing suffix. The upstream account name does not.
pub fn strip_region_suffix(username: &str) -> String {
    username.replace("-region-US", "").trim().to_string()
}
