mod drag;
mod error;
mod notify;
mod persist;
mod session;
mod tree;

pub use drag::DragEvent;
pub use error::StructureError;
pub use notify::{CollectingSink, NoticeKind, NotificationSink};
pub use persist::{ActionResult, CourseStore, PersistCall};
pub use session::{EditorSession, Outcome, PendingReconciliation, SessionOptions};
pub use tree::{LessonPosition, TitleRules};
