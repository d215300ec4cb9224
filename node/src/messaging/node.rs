//! Named node within a context.

use super::context::{Context, SharedLink};
use crate::error::MessagingError;
use crate::wire::MAX_TOPIC;

pub struct Node {
    name: String,
    namespace: String,
    link: SharedLink,
}

impl Node {
    /// `namespace` may be empty or a `/`-separated path.
    pub fn new(ctx: &Context, name: &str, namespace: &str) -> Result<Self, MessagingError> {
        if !valid_segment(name) {
            return Err(MessagingError::InvalidName(name.to_owned()));
        }
        let namespace = namespace.trim_matches('/');
        if !namespace.is_empty() && !namespace.split('/').all(valid_segment) {
            return Err(MessagingError::InvalidName(namespace.to_owned()));
        }

        log::info!("[NODE] Created '{}' in '/{}'", name, namespace);
        Ok(Self { name: name.to_owned(), namespace: namespace.to_owned(), link: ctx.link() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `/<namespace>/<topic>`, or `/<topic>` without a namespace.
    pub fn qualify(&self, topic: &str) -> Result<String, MessagingError> {
        let bare = topic.trim_start_matches('/');
        if !bare.split('/').all(valid_segment) {
            return Err(MessagingError::InvalidName(topic.to_owned()));
        }
        let full = if self.namespace.is_empty() {
            format!("/{}", bare)
        } else {
            format!("/{}/{}", self.namespace, bare)
        };
        if full.len() > MAX_TOPIC {
            return Err(MessagingError::InvalidName(full));
        }
        Ok(full)
    }

    pub(crate) fn link(&self) -> SharedLink {
        self.link.clone()
    }

    pub(crate) fn ensure_open(&self) -> Result<(), MessagingError> {
        if self.link.borrow().is_open() {
            Ok(())
        } else {
            Err(MessagingError::LinkClosed)
        }
    }

    pub fn fini(self) -> Result<(), MessagingError> {
        self.ensure_open()?;
        log::info!("[NODE] Finalized '{}'", self.name);
        Ok(())
    }
}

fn valid_segment(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
