pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const STATS: &str = "📊";
    pub const LINK: &str = "🔗";
    pub const UNLINK: &str = "✂️";
    pub const DEL: &str = "🗑️";
    pub const PACKAGE: &str = "📦";
    pub const MEDIA: &str = "🖼️";
    pub const TILES: &str = "🧱";
    pub const FEATURES: &str = "📍";
    pub const ATTRIBUTES: &str = "🏷️";
    pub const CUSTOM: &str = "🧩";
    pub const LOCK: &str = "🔒";
    pub const EMPTY: &str = "∅";
}

impl Icons {
    /// Icon for a relation name
    pub fn relation(name: &str) -> &'static str {
        match name {
            "media" => Self::MEDIA,
            "tiles" => Self::TILES,
            "features" => Self::FEATURES,
            "attributes" | "simple_attributes" => Self::ATTRIBUTES,
            _ => Self::CUSTOM,
        }
    }
}
