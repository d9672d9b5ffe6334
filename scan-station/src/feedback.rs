//! Operator feedback
//!
//! The floor hardware shows a status pill and speaks short Russian phrases;
//! a desk terminal just prints. Both sit behind one seam so the session
//! reports transitions the same way everywhere and tests can record what
//! the operator would have heard.

use shared::ErrorCode;

/// Spoken operator notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    NoCity,
    NoBox,
    BoxNotClosed,
    CityNotClosed,
    CityClosed,
    BoxClosed,
    SyncError,
    BoxTimeout,
    CyrillicError,
}

impl Notice {
    /// Message shown/spoken to the operator (ru-RU, the floor language)
    pub fn message(&self) -> &'static str {
        match self {
            Notice::NoCity => "Сначала откройте город",
            Notice::NoBox => "Сначала откройте короб",
            Notice::BoxNotClosed => "Сначала закройте текущий короб",
            Notice::CityNotClosed => "Сначала закройте текущий город",
            Notice::CityClosed => "Город закрыт",
            Notice::BoxClosed => "Короб закрыт",
            Notice::SyncError => "Ошибка синхронизации",
            Notice::BoxTimeout => "Короб автоматически закрыт",
            Notice::CyrillicError => "Ошибка: кириллица в QR-коде",
        }
    }
}

impl From<ErrorCode> for Notice {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NoCity => Notice::NoCity,
            ErrorCode::NoBox => Notice::NoBox,
            ErrorCode::BoxNotClosed => Notice::BoxNotClosed,
            ErrorCode::CityNotClosed => Notice::CityNotClosed,
            ErrorCode::CyrillicError => Notice::CyrillicError,
        }
    }
}

/// Status pill tone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Ok,
    Warn,
    Error,
}

/// Seam between the session and whatever faces the operator
pub trait Feedback: Send + Sync {
    /// Update the status pill
    fn pill(&self, tone: Tone, label: &str);

    /// Speak a notice
    fn say(&self, notice: Notice);

    /// Pill update plus spoken message for a rejected scan
    fn reject(&self, code: ErrorCode) {
        let (tone, label) = match code {
            ErrorCode::CyrillicError => (Tone::Error, "CYRILLIC"),
            ErrorCode::NoCity => (Tone::Warn, "NO CITY"),
            ErrorCode::NoBox => (Tone::Warn, "NO BOX"),
            ErrorCode::BoxNotClosed | ErrorCode::CityNotClosed => (Tone::Warn, "NEED CLOSE"),
        };
        self.pill(tone, label);
        self.say(code.into());
    }
}

/// Terminal feedback: the pill becomes a bracketed tag, notices print as
/// lines. This is the whole operator UI of the console build.
pub struct ConsoleFeedback;

impl Feedback for ConsoleFeedback {
    fn pill(&self, tone: Tone, label: &str) {
        let mark = match tone {
            Tone::Ok => "",
            Tone::Warn => "! ",
            Tone::Error => "!! ",
        };
        println!("[{mark}{label}]");
    }

    fn say(&self, notice: Notice) {
        println!(">> {}", notice.message());
    }
}

/// Records every call for assertions
#[cfg(test)]
pub struct RecordingFeedback {
    pub pills: parking_lot::Mutex<Vec<(Tone, String)>>,
    pub spoken: parking_lot::Mutex<Vec<Notice>>,
}

#[cfg(test)]
impl RecordingFeedback {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            pills: parking_lot::Mutex::new(Vec::new()),
            spoken: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.spoken.lock().last().copied()
    }

    pub fn last_pill(&self) -> Option<(Tone, String)> {
        self.pills.lock().last().cloned()
    }
}

#[cfg(test)]
impl Feedback for RecordingFeedback {
    fn pill(&self, tone: Tone, label: &str) {
        self.pills.lock().push((tone, label.to_string()));
    }

    fn say(&self, notice: Notice) {
        self.spoken.lock().push(notice);
    }
}
