pub mod coordinator;
pub mod protocol;
pub mod store;
pub mod transport;

pub use coordinator::{Coordinator, OperatorEvent};
pub use protocol::{AgentMessage, GuiMessage};
pub use store::{IdentifierStore, MemoryFetcher, MemoryStore, PageFetcher};
pub use transport::{ChannelTransport, Transport};
