pub mod answer;
pub mod event;
pub mod observation;
pub mod timeline;

pub use answer::*;
pub use event::*;
pub use observation::*;
pub use timeline::*;
