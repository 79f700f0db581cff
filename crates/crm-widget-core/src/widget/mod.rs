//! The widget surface: coordinator, view state and mount guard.

pub mod coordinator;
pub mod host;
pub mod view;

pub use coordinator::SessionCoordinator;
pub use host::WidgetHost;
pub use view::{Notice, WidgetView};
