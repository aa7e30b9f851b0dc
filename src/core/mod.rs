// Domain-layer modules and shared errors/models
pub mod formatting {
    pub use crate::formatting::*;
}

pub mod ledger {
    pub use crate::ledger::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod reminder_message {
    pub use crate::reminder_message::*;
}

pub mod reminders {
    pub use crate::reminders::*;
}

pub mod errors {
    pub use crate::errors::*;
}
