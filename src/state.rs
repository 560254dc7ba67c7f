use std::sync::Arc;

use crate::{db::OrmConn, events::EventPublisher, payment::PaymentVerifier};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub jwt_secret: Arc<str>,
    pub payments: Arc<dyn PaymentVerifier>,
    pub events: Arc<dyn EventPublisher>,
}

impl AppState {
    pub fn new(
        orm: OrmConn,
        jwt_secret: impl Into<Arc<str>>,
        payments: Arc<dyn PaymentVerifier>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            orm,
            jwt_secret: jwt_secret.into(),
            payments,
            events,
        }
    }
}
