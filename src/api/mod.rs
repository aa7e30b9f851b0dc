// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod cron_handler {
    pub use crate::cron_handler::*;
}

pub mod router {
    pub use crate::router::*;
}
