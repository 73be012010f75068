use md5::{Digest, Md5};

const GRAVATAR_BASE: &str = "http://www.gravatar.com/avatar/";

/// Gravatar URL for an email address, `None` for an empty address
pub fn avatar_url(email: &str) -> Option<String> {
    if email.is_empty() {
        return None;
    }

    let digest = Md5::digest(email.to_lowercase().as_bytes());
    Some(format!("{}{:x}", GRAVATAR_BASE, digest))
}
