//! Standard script classification utilities.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptType {
    P2Pk,
    P2Pkh,
    P2Sh,
    Unknown,
}

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

pub fn classify_script_pubkey(script: &[u8]) -> ScriptType {
    if is_p2pkh(script) {
        ScriptType::P2Pkh
    } else if is_p2sh(script) {
        ScriptType::P2Sh
    } else if pubkey_from_p2pk(script).is_some() {
        ScriptType::P2Pk
    } else {
        ScriptType::Unknown
    }
}

/// The raw public key of a pay-to-pubkey output, if the script is one.
///
/// Block signatures are only accepted against this script form.
pub fn pubkey_from_p2pk(script: &[u8]) -> Option<&[u8]> {
    let key_len = match script.first().copied() {
        Some(len @ 33) | Some(len @ 65) => len as usize,
        _ => return None,
    };
    if script.len() != key_len + 2 || script[script.len() - 1] != OP_CHECKSIG {
        return None;
    }
    Some(&script[1..1 + key_len])
}

fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL
}
