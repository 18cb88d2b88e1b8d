use ds::PeerId;

/// Nickname used when none is configured: `$USER-<short id>`.
pub fn default_nick(peer: &PeerId) -> String {
    let user = std::env::var("USER").unwrap_or_default();
    format!("{user}-{}", peer.short())
}

/// Whether a message carrying destination `to` is meant for `me`.
///
/// An empty destination is a broadcast. Otherwise the destination must be
/// exactly our short id or our full id.
pub fn is_addressed_to(to: &str, me: &PeerId) -> bool {
    let to = to.trim();
    to.is_empty() || to == me.short() || to == me.as_str()
}
