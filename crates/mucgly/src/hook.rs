//! Hook delimiters and per-source hook configuration.
//!
//! A *hook* is a delimiter byte string. Three hooks are always active on a
//! source: the begin hook, the end hook and the escape. In multi-hook mode a
//! source instead carries an ordered list of begin/end pairs, each with an
//! optional *suspension* marker that temporarily turns the end hook into
//! literal macro content.
//!
//! The configuration also maintains a 256-entry table of the first byte of
//! every active delimiter, so that the parser can screen most input bytes
//! without probing any delimiter at all.

use crate::error::{Error, Result};

/// Default begin hook.
pub const HOOKBEG_DEFAULT: &[u8] = b"-<";
/// Default end hook.
pub const HOOKEND_DEFAULT: &[u8] = b">-";
/// Default escape.
pub const HOOKESC_DEFAULT: &[u8] = b"\\";

/// Maximum number of multi-hook pairs on one source.
pub const MULTI_LIMIT: usize = 127;

/// One begin/end delimiter pair, with an optional suspension marker.
///
/// `beg` and `end` are always non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookPair {
    pub beg: Vec<u8>,
    pub end: Vec<u8>,
    pub susp: Option<Vec<u8>>,
}

/// Which delimiter a mutation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookKind {
    Beg,
    End,
    Esc,
}

/// Set of bytes that can appear as the first byte of an active delimiter.
#[derive(Clone)]
struct FirstByteSet([bool; 256]);

impl FirstByteSet {
    fn clear(&mut self) {
        self.0 = [false; 256];
    }
    fn insert(&mut self, byte: u8) {
        self.0[byte as usize] = true;
    }
    fn contains(&self, byte: u8) -> bool {
        self.0[byte as usize]
    }
}

/// Per-source delimiter configuration.
///
/// The configuration is either in *single* mode (one begin/end pair) or in
/// *multi* mode (an ordered list of pairs, first match wins). The escape and
/// the optional eater apply in both modes. New sources deep-copy the
/// configuration of the source that pushed them.
#[derive(Clone)]
pub struct HookConfig {
    hook: HookPair,
    multi: Option<Vec<HookPair>>,
    esc: Vec<u8>,
    eater: Option<Vec<u8>>,
    esc_eq_beg: bool,
    esc_eq_end: bool,
    first_bytes: FirstByteSet,
}

impl Default for HookConfig {
    fn default() -> HookConfig {
        let mut cfg = HookConfig {
            hook: HookPair {
                beg: HOOKBEG_DEFAULT.into(),
                end: HOOKEND_DEFAULT.into(),
                susp: None,
            },
            multi: None,
            esc: HOOKESC_DEFAULT.into(),
            eater: None,
            esc_eq_beg: false,
            esc_eq_end: false,
            first_bytes: FirstByteSet([false; 256]),
        };
        cfg.rebuild();
        cfg
    }
}

impl HookConfig {
    /// The single-mode begin/end pair.
    ///
    /// This pair survives multi mode: it is what the configuration falls
    /// back to when a single delimiter is set again.
    pub fn hook(&self) -> &HookPair {
        &self.hook
    }

    /// The multi-hook pairs, if the configuration is in multi mode.
    pub fn multi(&self) -> Option<&[HookPair]> {
        self.multi.as_deref()
    }

    pub fn esc(&self) -> &[u8] {
        &self.esc
    }

    pub fn eater(&self) -> Option<&[u8]> {
        self.eater.as_deref()
    }

    /// True when the escape equals the begin hook (single mode only).
    pub fn esc_eq_beg(&self) -> bool {
        self.esc_eq_beg
    }

    /// True when the escape equals the end hook (single mode only).
    pub fn esc_eq_end(&self) -> bool {
        self.esc_eq_end
    }

    /// Could `byte` start one of the active delimiters?
    pub fn is_first_byte(&self, byte: u8) -> bool {
        self.first_bytes.contains(byte)
    }

    /// Replace one delimiter.
    ///
    /// Setting the begin or end hook while in multi mode leaves multi mode
    /// and discards the pair list. Empty delimiter values are rejected.
    pub fn set_hook(&mut self, kind: HookKind, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::error(None, "hook delimiters must not be empty"));
        }
        if self.multi.is_some() && kind != HookKind::Esc {
            self.multi = None;
        }
        match kind {
            HookKind::Beg => self.hook.beg = value.to_vec(),
            HookKind::End => self.hook.end = value.to_vec(),
            HookKind::Esc => self.esc = value.to_vec(),
        }
        self.rebuild();
        Ok(())
    }

    /// Set or clear the eater. An empty value clears it.
    pub fn set_eater(&mut self, value: Option<&[u8]>) {
        self.eater = match value {
            None => None,
            Some([]) => None,
            Some(bytes) => Some(bytes.to_vec()),
        };
    }

    /// Append a pair to the multi-hook list, entering multi mode if needed.
    pub fn add_multi(&mut self, beg: &[u8], end: &[u8], susp: Option<&[u8]>) -> Result<()> {
        if beg.is_empty() || end.is_empty() {
            return Err(Error::error(None, "hook delimiters must not be empty"));
        }
        if self.esc == beg || self.esc == end {
            return Err(Error::fatal(
                None,
                "the escape hook is not allowed to match multi-hooks",
            ));
        }
        let pairs = self.multi.get_or_insert_with(Vec::new);
        if pairs.len() >= MULTI_LIMIT {
            return Err(Error::fatal(
                None,
                format!("too many multi-hooks, {MULTI_LIMIT} allowed"),
            ));
        }
        pairs.push(HookPair {
            beg: beg.to_vec(),
            end: end.to_vec(),
            susp: match susp {
                None | Some([]) => None,
                Some(bytes) => Some(bytes.to_vec()),
            },
        });
        self.rebuild();
        Ok(())
    }

    // Recompute the derived equalities and the first-byte table from every
    // reachable delimiter.
    fn rebuild(&mut self) {
        self.first_bytes.clear();
        match &self.multi {
            Some(pairs) => {
                self.esc_eq_beg = false;
                self.esc_eq_end = false;
                for pair in pairs {
                    self.first_bytes.insert(pair.beg[0]);
                    self.first_bytes.insert(pair.end[0]);
                    if let Some(susp) = &pair.susp {
                        self.first_bytes.insert(susp[0]);
                    }
                }
            }
            None => {
                self.esc_eq_beg = self.esc == self.hook.beg;
                self.esc_eq_end = self.esc == self.hook.end;
                self.first_bytes.insert(self.hook.beg[0]);
                self.first_bytes.insert(self.hook.end[0]);
            }
        }
        self.first_bytes.insert(self.esc[0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_bytes(cfg: &HookConfig) -> Vec<u8> {
        (0..=255u8).filter(|&b| cfg.is_first_byte(b)).collect()
    }

    #[test]
    fn default_first_bytes() {
        let cfg = HookConfig::default();
        assert_eq!(first_bytes(&cfg), vec![b'-', b'>', b'\\']);
        assert!(!cfg.esc_eq_beg());
        assert!(!cfg.esc_eq_end());
    }

    #[test]
    fn set_hook_updates_first_bytes() {
        let mut cfg = HookConfig::default();
        cfg.set_hook(HookKind::Beg, b"{{").unwrap();
        cfg.set_hook(HookKind::Esc, b"!").unwrap();
        assert_eq!(first_bytes(&cfg), vec![b'!', b'>', b'{']);
    }

    #[test]
    fn escape_equalities() {
        let mut cfg = HookConfig::default();
        cfg.set_hook(HookKind::Beg, b"!").unwrap();
        cfg.set_hook(HookKind::End, b"!").unwrap();
        cfg.set_hook(HookKind::Esc, b"!").unwrap();
        assert!(cfg.esc_eq_beg());
        assert!(cfg.esc_eq_end());
        cfg.set_hook(HookKind::End, b"]").unwrap();
        assert!(cfg.esc_eq_beg());
        assert!(!cfg.esc_eq_end());
    }

    #[test]
    fn empty_delimiter_rejected() {
        let mut cfg = HookConfig::default();
        assert!(cfg.set_hook(HookKind::Beg, b"").is_err());
        assert!(cfg.add_multi(b"", b"]", None).is_err());
    }

    #[test]
    fn eater_empty_clears() {
        let mut cfg = HookConfig::default();
        cfg.set_eater(Some(b"%%"));
        assert_eq!(cfg.eater(), Some(&b"%%"[..]));
        cfg.set_eater(Some(b""));
        assert_eq!(cfg.eater(), None);
    }

    #[test]
    fn multi_mode_first_bytes() {
        let mut cfg = HookConfig::default();
        cfg.add_multi(b"(", b")", Some(b"|")).unwrap();
        cfg.add_multi(b"[", b"]", None).unwrap();
        assert_eq!(
            first_bytes(&cfg),
            vec![b'(', b')', b'[', b'\\', b']', b'|']
        );
        assert!(!cfg.esc_eq_beg());
        assert!(!cfg.esc_eq_end());
    }

    #[test]
    fn multi_first_bytes_survive_escape_change() {
        let mut cfg = HookConfig::default();
        cfg.add_multi(b"(", b")", None).unwrap();
        cfg.add_multi(b"[", b"]", None).unwrap();
        cfg.set_hook(HookKind::Esc, b"!").unwrap();
        // every pair's first byte is still present after the escape moved
        assert_eq!(first_bytes(&cfg), vec![b'!', b'(', b')', b'[', b']']);
        assert!(cfg.multi().is_some());
    }

    #[test]
    fn leaving_multi_mode_clears_pairs() {
        let mut cfg = HookConfig::default();
        cfg.add_multi(b"(", b")", None).unwrap();
        cfg.set_hook(HookKind::Beg, b"{{").unwrap();
        assert!(cfg.multi().is_none());
        assert_eq!(cfg.hook().beg, b"{{".to_vec());
        assert_eq!(cfg.hook().end, HOOKEND_DEFAULT.to_vec());
        assert_eq!(first_bytes(&cfg), vec![b'>', b'\\', b'{']);
    }

    #[test]
    fn escape_conflicts_with_multi_pair() {
        let mut cfg = HookConfig::default();
        let err = cfg.add_multi(b"\\", b")", None).unwrap_err();
        assert_eq!(err.severity(), crate::error::Severity::Fatal);
        let err = cfg.add_multi(b"(", b"\\", None).unwrap_err();
        assert_eq!(err.severity(), crate::error::Severity::Fatal);
    }

    #[test]
    fn multi_limit_enforced() {
        let mut cfg = HookConfig::default();
        for i in 0..MULTI_LIMIT {
            let beg = format!("b{i}");
            let end = format!("e{i}");
            cfg.add_multi(beg.as_bytes(), end.as_bytes(), None).unwrap();
        }
        let err = cfg.add_multi(b"x", b"y", None).unwrap_err();
        assert_eq!(err.severity(), crate::error::Severity::Fatal);
    }
}
