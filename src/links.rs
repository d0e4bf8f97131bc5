/// Hosting sites the bot accepts links from, matched as substrings.
pub const SUPPORTED_SITES: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "twitter.com",
    "x.com",
    "instagram.com",
    "facebook.com",
];

/// Case-insensitive check for any supported site in `text`.
pub fn is_supported(text: &str) -> bool {
    let lower = text.to_lowercase();
    SUPPORTED_SITES.iter().any(|site| lower.contains(site))
}
