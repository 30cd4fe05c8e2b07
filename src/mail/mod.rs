//! Sending notifications by email.

use lettre_email::Mailbox;
use serde::Serialize;
use std::cell::RefCell;

use crate::templates::MAILS;

mod config;
mod transport;

pub use self::{
    config::{Config, Transports},
    transport::{Message, Transport},
};

pub struct Mailer {
    transport: RefCell<Box<dyn Transport>>,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Mailer {
        Mailer::with_transport(transport::from_config(config))
    }

    /// Create a mailer delivering messages through a custom transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Mailer {
        Mailer {
            transport: RefCell::new(transport),
        }
    }

    /// Render a message from a template and send it.
    ///
    /// Each template is a pair of files, `{template}.txt` and
    /// `{template}.html`.
    pub fn send<C>(
        &self,
        template: &str,
        to: &[String],
        subject: &str,
        context: &C,
    ) -> crate::Result<()>
    where
        C: Serialize,
    {
        let message = format_message(template, to, subject, context)?;
        self.transport.borrow_mut().send(message)
    }
}

fn format_message<C>(template: &str, to: &[String], subject: &str, context: &C)
-> crate::Result<Message>
where
    C: Serialize,
{
    let render = |name: String| MAILS.render(&name, context)
        .map_err(|e| failure::err_msg(
            format!("Could not render template {}: {}", name, e)));

    Ok(Message {
        to: to.iter().map(|email| Mailbox::new(email.clone())).collect(),
        subject: subject.to_string(),
        html: render(format!("{}.html", template))?,
        text: render(format!("{}.txt", template))?,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    struct Recorder(Rc<RefCell<Vec<Message>>>);

    impl Transport for Recorder {
        fn send(&mut self, message: Message) -> crate::Result<()> {
            self.0.borrow_mut().push(message);
            Ok(())
        }
    }

    #[derive(Serialize)]
    struct Page {
        title: &'static str,
    }

    #[derive(Serialize)]
    struct Context {
        page: Page,
        admin_url: &'static str,
    }

    #[test]
    fn renders_approval_request() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mailer = Mailer::with_transport(Box::new(Recorder(sent.clone())));

        mailer.send(
            "approval-required",
            &["a@folio.test".to_string(), "b@folio.test".to_string()],
            "CMS - Page Home requires approval.",
            &Context {
                page: Page { title: "Home" },
                admin_url: "http://cms.example.org/admin/cms/page/1/",
            },
        ).unwrap();

        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.len(), 2);
        assert_eq!(sent[0].subject, "CMS - Page Home requires approval.");
        assert!(sent[0].text.contains("Home"));
        assert!(sent[0].text.contains("http://cms.example.org/admin/cms/page/1/"));
        assert!(sent[0].html.contains("<strong>Home</strong>"));
    }

    #[test]
    fn missing_template_is_an_error() {
        let mailer = Mailer::with_transport(Box::new(Recorder(Default::default())));
        assert!(mailer.send("no-such-template", &[], "", &()).is_err());
    }
}
