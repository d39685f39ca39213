//! Decoder registry
//!
//! Holds the descriptors a runtime can instantiate, in registration order.

use super::descriptor::DecoderDescriptor;
use super::errors::{Error, Result};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Arc<DecoderDescriptor>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor; its id must not be registered yet
    pub fn register(&mut self, descriptor: DecoderDescriptor) -> Result<Arc<DecoderDescriptor>> {
        if self.get(descriptor.id()).is_some() {
            return Err(Error::arg(format!(
                "decoder '{}' is already registered",
                descriptor.id()
            )));
        }
        self.decoders.try_reserve(1)?;
        debug!("Registered decoder {}", descriptor.id());
        let descriptor = Arc::new(descriptor);
        self.decoders.push(Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Remove a descriptor. Existing instances keep their shared copy.
    pub fn unregister(&mut self, id: &str) -> Result<Arc<DecoderDescriptor>> {
        let pos = self
            .decoders
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| Error::arg(format!("decoder '{}' not found", id)))?;
        debug!("Unregistered decoder {}", id);
        Ok(self.decoders.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<DecoderDescriptor>> {
        self.decoders.iter().find(|d| d.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DecoderDescriptor>> {
        self.decoders.iter()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::errors::ErrorKind;
    use crate::runtime::testing::NullLogic;

    fn descriptor(id: &str) -> DecoderDescriptor {
        DecoderDescriptor::builder(id, NullLogic::factory()).build().unwrap()
    }

    #[test]
    fn test_register_keeps_order() {
        let mut reg = DecoderRegistry::new();
        reg.register(descriptor("uart")).unwrap();
        reg.register(descriptor("i2c")).unwrap();
        let ids: Vec<&str> = reg.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["uart", "i2c"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = DecoderRegistry::new();
        reg.register(descriptor("uart")).unwrap();
        let err = reg.register(descriptor("uart")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut reg = DecoderRegistry::new();
        let kept = reg.register(descriptor("uart")).unwrap();
        let removed = reg.unregister("uart").unwrap();
        assert!(Arc::ptr_eq(&kept, &removed));
        assert!(reg.get("uart").is_none());
        assert!(reg.unregister("uart").is_err());
    }
}
