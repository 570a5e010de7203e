use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Receives user-facing feedback. Fire-and-forget: nothing is returned.
pub trait NotificationSink {
    fn notify(&mut self, kind: NoticeKind, message: &str);
}

/// Buffers notices so they can be handed back with an IPC response.
#[derive(Debug, Default)]
pub struct CollectingSink {
    notices: Vec<Notice>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn into_notices(self) -> Vec<Notice> {
        self.notices
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&mut self, kind: NoticeKind, message: &str) {
        self.notices.push(Notice {
            kind,
            message: message.to_string(),
        });
    }
}
