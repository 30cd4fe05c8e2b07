use folio::{
    config::{self, Config},
    mail::{Mailer, Message, Transport},
};
use std::{cell::RefCell, rc::Rc};

mod db;

pub use self::db::{Database, setup_db};

/// Configuration used in tests. Page permissions are not enforced, so that
/// tests can focus on moderation.
pub fn config() -> Config {
    config::parse(br#"
        [server]
        domain = "cms.example.org"

        [moderation]
        moderator = true
        permission = false

        [mail]
        sender = "cms@example.org"
        transport = "log"
    "#).expect("test configuration to be valid")
}

/// Mail transport storing all sent messages.
#[derive(Clone, Default)]
pub struct Outbox(Rc<RefCell<Vec<Message>>>);

impl Outbox {
    pub fn mailer(&self) -> Mailer {
        Mailer::with_transport(Box::new(self.clone()))
    }

    pub fn recipients(&self) -> Vec<Vec<String>> {
        self.0.borrow()
            .iter()
            .map(|message| message.to.iter().map(|m| m.address.clone()).collect())
            .collect()
    }
}

impl Transport for Outbox {
    fn send(&mut self, message: Message) -> Result<(), failure::Error> {
        self.0.borrow_mut().push(message);
        Ok(())
    }
}
