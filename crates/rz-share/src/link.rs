//! Share-link encoding: `https://<host>/share/<grant_id>#<key>`
//!
//! The fragment is the security boundary. Browsers strip everything after
//! `#` before sending a request, so the disclosure key never appears in
//! server access logs or request lines. Parsing happens strictly
//! client-side; nothing here ever puts the fragment on the wire.

use uuid::Uuid;

use crate::error::{ShareError, ShareResult};
use crate::grant::DisclosureKey;

/// Build the full share URL for a minted grant.
pub fn encode_share_link(host: &str, grant_id: &Uuid, key: &DisclosureKey) -> String {
    format!("https://{host}/share/{grant_id}#{}", key.to_fragment())
}

/// Parse a share URL back into its grant id and disclosure key.
pub fn parse_share_link(url: &str) -> ShareResult<(Uuid, DisclosureKey)> {
    let (address, fragment) = url
        .split_once('#')
        .ok_or_else(|| ShareError::Link("missing key fragment".into()))?;

    if fragment.is_empty() {
        return Err(ShareError::Link("empty key fragment".into()));
    }

    let grant_segment = address
        .rsplit_once("/share/")
        .map(|(_, id)| id)
        .ok_or_else(|| ShareError::Link("missing /share/ path".into()))?;

    let grant_id = Uuid::parse_str(grant_segment)
        .map_err(|e| ShareError::Link(format!("bad grant id: {e}")))?;

    let key = DisclosureKey::from_fragment(fragment)?;
    Ok((grant_id, key))
}
