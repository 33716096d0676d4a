use crate::client::UaClient;
use crate::coerce::coerce;
use crate::error::{ClientError, WriteError};
use crate::value::{InputValue, UaValue, VariantType};

/// Read and type-correct write of a single node over a live client.
pub struct NodeValueAccessor<'a, C: UaClient + ?Sized> {
    client: &'a mut C,
    node_id: &'a str,
}

impl<'a, C: UaClient + ?Sized> NodeValueAccessor<'a, C> {
    pub fn new(client: &'a mut C, node_id: &'a str) -> Self {
        Self { client, node_id }
    }

    pub fn read(&mut self) -> Result<UaValue, ClientError> {
        self.client.read(self.node_id)
    }

    pub fn declared_type(&mut self) -> Result<VariantType, ClientError> {
        self.read().map(|value| value.variant_type())
    }

    /// Writes `value` re-encoded as the node's current type and returns what
    /// was sent. Fails without writing if the type cannot be fetched.
    pub fn write(&mut self, value: &InputValue) -> Result<UaValue, WriteError> {
        let declared = self.declared_type().map_err(WriteError::TypeLookup)?;
        let encoded = coerce(value, declared)?;
        self.client
            .write(self.node_id, encoded.clone())
            .map_err(WriteError::Rejected)?;
        Ok(encoded)
    }
}
