//! Signs a call request against the in-process mock device and prints the
//! resulting envelope fields.
//!
//! ```sh
//! cargo run -p hardsign-identity --example sign_demo
//! ```

use anyhow::Result;
use hardsign_device::testing::MockDevice;
use hardsign_identity::{
    logging, Blob, CallRequest, LedgerIdentity, Principal, RequestContent,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await?;
    info!(principal = %identity.sender()?.to_text(), "identity ready");

    let request = RequestContent::Call(CallRequest {
        canister_id: Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 42])?,
        method_name: "icrc1_transfer".to_string(),
        arg: Blob(vec![0x44, 0x49, 0x44, 0x4c, 0x00, 0x00]),
        sender: identity.sender()?,
        ingress_expiry: 1_700_000_000_000_000_000,
        nonce: None,
    });

    let envelope = identity.transform_request(request).await?;
    println!("sender_pubkey (DER): {}", hex::encode(envelope.sender_pubkey.as_slice()));
    println!("sender_sig:          {}", hex::encode(envelope.sender_sig.as_slice()));
    println!(
        "connections:         {} opened, {} released",
        device.connect_count(),
        device.close_count()
    );
    Ok(())
}
