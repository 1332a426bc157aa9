use crate::workspace::{Notice, NoticeLevel, Workspace};

#[derive(Clone, Debug)]
pub(crate) struct FlashMessage {
    pub(crate) text: String,
    pub(crate) class: &'static str,
}

impl From<Notice> for FlashMessage {
    fn from(notice: Notice) -> Self {
        let class = match notice.level {
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
        };
        Self {
            text: notice.text,
            class,
        }
    }
}

pub(crate) fn take_flash_message(workspace: &mut Workspace) -> Option<FlashMessage> {
    workspace.take_notice().map(FlashMessage::from)
}
