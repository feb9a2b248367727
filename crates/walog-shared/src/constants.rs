/// Application name
pub const APP_NAME: &str = "walog";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 3003;

/// Maximum size of a single uploaded file in bytes (50 MiB)
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Conversation id suffix used by group chats
pub const GROUP_SUFFIX: &str = "@g.us";

/// Number of hex characters in a generated message id
pub const MESSAGE_ID_LEN: usize = 14;

/// Message `type` assigned to plain chat messages
pub const CHAT_KIND: &str = "chat";

/// Device type recorded for messages composed by the viewer
pub const WEB_DEVICE: &str = "web";

/// Sidebar preview shown when the last message only carries media
pub const MEDIA_PLACEHOLDER: &str = "📷 Media";

/// Prefix of a sidebar preview that shows an unsent draft
pub const DRAFT_PREFIX: &str = "Draft: ";
