//! The signing identity orchestrator.

use hardsign_codec::{
    derive_read_state, encode_for_signing, DevicePublicKey, Principal, RequestContent,
    SignedEnvelope,
};
use hardsign_device::{
    decode_signature, decode_update_signatures, version, DerivationPath, DeviceError,
    DeviceTransport, LedgerApp, RequestSignatures, Signature, Version,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A signing identity rooted in a hardware device.
///
/// Owns an immutable derivation path and the device public key cached at
/// creation; the transport is injected, never discovered. One logical
/// signing operation runs at a time per instance (the device serializes
/// user approvals anyway), and the cached path/key pair is the only state
/// shared across operations, so no locking is needed.
pub struct LedgerIdentity {
    derive_path: DerivationPath,
    public_key: DevicePublicKey,
    transport: Arc<dyn DeviceTransport>,
}

impl fmt::Debug for LedgerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerIdentity")
            .field("derive_path", &self.derive_path)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl LedgerIdentity {
    /// Creates an identity on the default derivation path.
    ///
    /// Fetches the public key from the device and verifies that the
    /// device-reported principal matches the key before the identity is
    /// usable; on any failure no identity is returned.
    pub async fn create(transport: Arc<dyn DeviceTransport>) -> Result<Self, DeviceError> {
        Self::create_with_path(transport, DerivationPath::platform_default()).await
    }

    /// Creates an identity on an explicit derivation path.
    pub async fn create_with_path(
        transport: Arc<dyn DeviceTransport>,
        derive_path: DerivationPath,
    ) -> Result<Self, DeviceError> {
        let mut connection = transport.connect().await?;
        let outcome = async {
            let mut app = LedgerApp::new(connection.as_mut());
            app.get_address_and_public_key(&derive_path).await
        }
        .await;
        let released = connection.close().await;

        let address = outcome?;
        released?;

        info!(principal = %address.principal_text, path = %derive_path, "ledger identity created");
        Ok(Self {
            derive_path,
            public_key: address.public_key,
            transport,
        })
    }

    /// The cached device public key.
    pub fn public_key(&self) -> &DevicePublicKey {
        &self.public_key
    }

    /// The self-authenticating principal this identity signs as.
    pub fn sender(&self) -> Result<Principal, DeviceError> {
        Ok(self.public_key.principal()?)
    }

    /// Signs an outgoing request and reassembles it as a submittable
    /// envelope.
    ///
    /// Call requests take the dual-sign path: the read-state companion is
    /// derived, both canonical encodings are signed in one user approval,
    /// and the *call* signature is attached. The read-state signature is
    /// validated but not attached here; the transport layer consumes it
    /// when polling for the call's status. Everything else takes the
    /// single-sign path.
    pub async fn transform_request(
        &self,
        content: RequestContent,
    ) -> Result<SignedEnvelope, DeviceError> {
        let sender_sig = if let RequestContent::Call(call) = &content {
            debug!(method = %call.method_name, "dual-sign path");
            let call_bytes = encode_for_signing(&content)?;
            let read_state = RequestContent::ReadState(derive_read_state(call));
            let read_state_bytes = encode_for_signing(&read_state)?;
            let signatures = self.sign_call(&call_bytes, &read_state_bytes).await?;
            signatures.call_signature
        } else {
            debug!("single-sign path");
            let bytes = encode_for_signing(&content)?;
            self.sign(&bytes).await?
        };

        Ok(SignedEnvelope {
            sender_pubkey: self.public_key.to_der()?.into(),
            sender_sig: sender_sig.to_vec().into(),
            content,
        })
    }

    /// Signs arbitrary canonical bytes with a single signature.
    pub async fn sign(&self, payload: &[u8]) -> Result<Signature, DeviceError> {
        self.ensure_supported_version().await?;

        let mut connection = self.transport.connect().await?;
        let outcome = async {
            let mut app = LedgerApp::new(connection.as_mut());
            self.verify_device_key(&mut app).await?;
            let response = app.sign(&self.derive_path, payload).await?;
            decode_signature(&response)
        }
        .await;
        let released = connection.close().await;

        let signature = outcome?;
        released?;
        Ok(signature)
    }

    /// Signs a call and its read-state companion in one user approval,
    /// returning both validated signatures.
    pub async fn sign_call(
        &self,
        call_payload: &[u8],
        read_state_payload: &[u8],
    ) -> Result<RequestSignatures, DeviceError> {
        self.ensure_supported_version().await?;

        let mut connection = self.transport.connect().await?;
        let outcome = async {
            let mut app = LedgerApp::new(connection.as_mut());
            self.verify_device_key(&mut app).await?;
            let response = app
                .sign_update_call(&self.derive_path, call_payload, read_state_payload)
                .await?;
            decode_update_signatures(&response)
        }
        .await;
        let released = connection.close().await;

        let signatures = outcome?;
        released?;
        Ok(signatures)
    }

    /// Fetches the device application version.
    ///
    /// Re-verifies the device key first, like every other operation, so a
    /// swapped device surfaces as [`DeviceError::IdentityMismatch`] even
    /// when the caller only asked for the version.
    pub async fn version(&self) -> Result<Version, DeviceError> {
        let mut connection = self.transport.connect().await?;
        let outcome = async {
            let mut app = LedgerApp::new(connection.as_mut());
            self.verify_device_key(&mut app).await?;
            app.get_version().await
        }
        .await;
        let released = connection.close().await;

        let version = outcome?;
        released?;
        Ok(version)
    }

    /// Displays the address on the device so the user can verify that what
    /// the host shows matches the device screen.
    pub async fn show_address_on_device(&self) -> Result<String, DeviceError> {
        let mut connection = self.transport.connect().await?;
        let outcome = async {
            let mut app = LedgerApp::new(connection.as_mut());
            self.verify_device_key(&mut app).await?;
            let address = app.show_address_and_public_key(&self.derive_path).await?;
            Ok::<_, DeviceError>(address.principal_text)
        }
        .await;
        let released = connection.close().await;

        let principal_text = outcome?;
        released?;
        Ok(principal_text)
    }

    /// Version gate: fetched fresh before every signing operation, since
    /// the device application can change between operations in a
    /// long-lived session.
    async fn ensure_supported_version(&self) -> Result<(), DeviceError> {
        let current = self.version().await?;
        version::ensure_supported(current)
    }

    /// The identity must fail closed if the device no longer holds the key
    /// it was created against (device swapped, app switched to another
    /// seed).
    async fn verify_device_key(&self, app: &mut LedgerApp<'_>) -> Result<(), DeviceError> {
        let address = app.get_address_and_public_key(&self.derive_path).await?;
        if address.public_key != self.public_key {
            warn!("device public key differs from the cached identity key");
            return Err(DeviceError::IdentityMismatch {
                reason: "the identity in use does not match the device identity".to_string(),
            });
        }
        Ok(())
    }
}
