//! `World.Load` / `World.Save` facade.

use std::path::Path;

use crate::abi::AbiValue;
use crate::binding::Bridge;
use crate::catalog::OpId;
use crate::BridgeError;

/// Replace the host's world with the file at `path`.
///
/// `Ok(false)` means the host could not read or parse the file; the world is
/// left untouched in that case. A path that is not valid UTF-8 cannot cross
/// the boundary and also yields `Ok(false)` without calling the host.
pub fn load(bridge: &Bridge, path: impl AsRef<Path>) -> Result<bool, BridgeError> {
    match path_arg(path.as_ref()) {
        Some(arg) => bridge.call_bool(OpId::WorldLoad, &[arg]),
        None => Ok(false),
    }
}

/// Write the host's world to `path`. `Ok(false)` on I/O failure or for a
/// path that is not valid UTF-8.
pub fn save(bridge: &Bridge, path: impl AsRef<Path>) -> Result<bool, BridgeError> {
    match path_arg(path.as_ref()) {
        Some(arg) => bridge.call_bool(OpId::WorldSave, &[arg]),
        None => Ok(false),
    }
}

fn path_arg(path: &Path) -> Option<AbiValue> {
    let Some(text) = path.to_str() else {
        tracing::warn!(path = %path.display(), "world path is not valid UTF-8");
        return None;
    };
    Some(AbiValue::Str(text.to_owned()))
}
