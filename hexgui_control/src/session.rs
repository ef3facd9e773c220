//! Controller session: one link at a time, its I/O task, and the published
//! view.

pub mod io_loop;
pub mod manager;
pub mod view;

pub use io_loop::{IoLoop, IoRequest, LinkExit};
pub use manager::Session;
pub use view::ControllerView;
