// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The `getsockopt(2)`/`setsockopt(2)` face of the table operations.
//!
//! Each option copies its request struct in from caller memory, runs
//! the matching table operation, and copies the response back out.

use super::ioctl::query_entries;
use super::ioctl::query_info;
use super::ioctl::replace_entries;
use super::store::TableStore;
use crate::ExecCtx;
use crate::api::GetOpt;
use crate::api::IptGetEntries;
use crate::api::IptGetinfo;
use crate::api::SetOpt;
use crate::api::TableName;
use crate::api::XtError;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::vec::Vec;
    } else {
        use std::vec::Vec;
    }
}

/// A fault while touching caller memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Fault;

/// The calling process's memory.
pub trait UserMem {
    /// Copy `len` bytes in from `addr`.
    fn copy_in(&self, addr: u64, len: usize) -> Result<Vec<u8>, Fault>;

    /// Copy `bytes` out to `addr`.
    fn copy_out(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Fault>;
}

fn copy_in<M: UserMem + ?Sized>(
    ectx: &ExecCtx,
    mem: &M,
    addr: u64,
    len: usize,
) -> Result<Vec<u8>, XtError> {
    mem.copy_in(addr, len).map_err(|_| {
        ectx.warn(&format!("failed to copy in {len} bytes at {addr:#x}"));
        XtError::CopyinReq
    })
}

fn copy_out<M: UserMem + ?Sized>(
    ectx: &ExecCtx,
    mem: &mut M,
    addr: u64,
    bytes: &[u8],
) -> Result<(), XtError> {
    mem.copy_out(addr, bytes).map_err(|_| {
        ectx.warn(&format!(
            "failed to copy out {} bytes at {addr:#x}",
            bytes.len()
        ));
        XtError::CopyoutResp
    })
}

fn table_name(
    ectx: &ExecCtx,
    raw: &[u8; crate::api::XT_TABLE_MAXNAMELEN],
) -> Result<TableName, XtError> {
    TableName::from_raw(raw).map_err(|e| {
        ectx.warn(&format!("bad table name in request: {e}"));
        XtError::BadName
    })
}

/// Handle `IPT_SO_GET_INFO`: fill in the `ipt_getinfo` at `addr`.
pub fn get_info<M: UserMem + ?Sized>(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    mem: &mut M,
    addr: u64,
) -> Result<IptGetinfo, XtError> {
    let req = copy_in(ectx, &*mem, addr, IptGetinfo::SIZE)?;
    let (req, _) =
        IptGetinfo::read_from_prefix(&req).map_err(|_| XtError::CopyinReq)?;
    let name = table_name(ectx, &req.name)?;

    let resp = query_info(ectx, store, &name)?.to_raw(&name);
    copy_out(ectx, mem, addr, resp.as_bytes())?;
    Ok(resp)
}

/// Handle `IPT_SO_GET_ENTRIES`: fill in the `ipt_get_entries` header
/// at `addr` and write the entries straight after it.
///
/// `out_len` is the caller's whole buffer, header included. Returns
/// the number of bytes written.
pub fn get_entries<M: UserMem + ?Sized>(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    mem: &mut M,
    addr: u64,
    out_len: usize,
) -> Result<usize, XtError> {
    if out_len < IptGetEntries::SIZE {
        ectx.warn(&format!("get entries buffer of {out_len} bytes"));
        return Err(XtError::BadLength {
            expected: IptGetEntries::SIZE,
            given: out_len,
        });
    }

    let req = copy_in(ectx, &*mem, addr, IptGetEntries::SIZE)?;
    let (req, _) = IptGetEntries::read_from_prefix(&req)
        .map_err(|_| XtError::CopyinReq)?;
    let name = table_name(ectx, &req.name)?;

    let enc =
        query_entries(ectx, store, &name, out_len - IptGetEntries::SIZE)?;
    let hdr = IptGetEntries {
        name: name.to_raw(),
        size: enc.metadata.size,
        _pad: [0; 4],
    };

    let mut resp = Vec::with_capacity(IptGetEntries::SIZE + enc.entries.len());
    resp.extend_from_slice(hdr.as_bytes());
    resp.extend_from_slice(&enc.entries);
    copy_out(ectx, mem, addr, &resp)?;
    Ok(resp.len())
}

/// Handle `IPT_SO_SET_REPLACE`: read `len` bytes at `addr` as a
/// replace blob and install the table it describes.
pub fn set_replace<M: UserMem + ?Sized>(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    mem: &M,
    addr: u64,
    len: usize,
) -> Result<TableName, XtError> {
    let blob = copy_in(ectx, mem, addr, len)?;
    replace_entries(ectx, store, &blob)
}

/// Dispatch an `ip_tables` `getsockopt(2)`.
///
/// Returns the number of bytes written at `addr`.
pub fn getsockopt<M: UserMem + ?Sized>(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    mem: &mut M,
    opt: i32,
    addr: u64,
    len: usize,
) -> Result<usize, XtError> {
    match GetOpt::try_from(opt) {
        Ok(GetOpt::Info) => {
            if len < IptGetinfo::SIZE {
                ectx.warn(&format!("get info buffer of {len} bytes"));
                return Err(XtError::BadLength {
                    expected: IptGetinfo::SIZE,
                    given: len,
                });
            }
            get_info(ectx, store, mem, addr)?;
            Ok(IptGetinfo::SIZE)
        }

        Ok(GetOpt::Entries) => get_entries(ectx, store, mem, addr, len),

        Err(_) => {
            ectx.warn(&format!("unknown getsockopt {opt}"));
            Err(XtError::UnknownOpt(opt))
        }
    }
}

/// Dispatch an `ip_tables` `setsockopt(2)`.
pub fn setsockopt<M: UserMem + ?Sized>(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    mem: &M,
    opt: i32,
    addr: u64,
    len: usize,
) -> Result<(), XtError> {
    match SetOpt::try_from(opt) {
        Ok(SetOpt::Replace) => {
            set_replace(ectx, store, mem, addr, len).map(|_| ())
        }

        // Counters are not kept, so there is nothing to add to.
        Ok(SetOpt::AddCounters) => {
            ectx.note("ignoring counter update");
            Ok(())
        }

        Err(_) => {
            ectx.warn(&format!("unknown setsockopt {opt}"));
            Err(XtError::UnknownOpt(opt))
        }
    }
}

/// A flat, zero-based address space backed by a `Vec`.
///
/// Any access that runs past the end faults.
#[cfg(any(feature = "test-help", test))]
#[derive(Clone, Debug, Default)]
pub struct VecMem {
    pub bytes: Vec<u8>,
}

#[cfg(any(feature = "test-help", test))]
impl VecMem {
    pub fn new(len: usize) -> Self {
        Self { bytes: vec![0; len] }
    }

    fn range(&self, addr: u64, len: usize) -> Result<(usize, usize), Fault> {
        let start = usize::try_from(addr).map_err(|_| Fault)?;
        let end = start.checked_add(len).ok_or(Fault)?;
        if end > self.bytes.len() {
            return Err(Fault);
        }
        Ok((start, end))
    }
}

#[cfg(any(feature = "test-help", test))]
impl UserMem for VecMem {
    fn copy_in(&self, addr: u64, len: usize) -> Result<Vec<u8>, Fault> {
        let (start, end) = self.range(addr, len)?;
        Ok(self.bytes[start..end].to_vec())
    }

    fn copy_out(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Fault> {
        let (start, end) = self.range(addr, bytes.len())?;
        self.bytes[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::IPT_SO_GET_ENTRIES;
    use crate::api::IPT_SO_GET_INFO;
    use crate::api::IPT_SO_SET_ADD_COUNTERS;
    use crate::engine::ioctl::install_defaults;
    use crate::engine::store::IpTables;
    use crate::provider::PrintlnLog;

    fn ectx() -> ExecCtx {
        ExecCtx { log: Box::new(PrintlnLog) }
    }

    fn setup() -> IpTables {
        let store = IpTables::new();
        install_defaults(&ectx(), &store);
        store
    }

    fn name_raw(name: &str) -> [u8; 32] {
        TableName::new(name).unwrap().to_raw()
    }

    #[test]
    fn info_round_trip() {
        let store = setup();
        let mut mem = VecMem::new(256);
        let req = IptGetinfo { name: name_raw("mangle"), ..Default::default() };
        mem.copy_out(16, req.as_bytes()).unwrap();

        let n = getsockopt(&ectx(), &store, &mut mem, IPT_SO_GET_INFO, 16, 84)
            .unwrap();
        assert_eq!(n, 84);

        let (resp, _) =
            IptGetinfo::read_from_prefix(&mem.bytes[16..]).unwrap();
        assert_eq!(resp.name, name_raw("mangle"));
        assert_eq!(resp.valid_hooks, 0b1001);
        assert_eq!(resp.num_entries, 3);
        assert_eq!(resp.hook_entry, [0, 0, 0, 152, 0]);
        assert_eq!(resp.size, 2 * 152 + 176);
    }

    #[test]
    fn info_short_buffer() {
        let store = setup();
        let mut mem = VecMem::new(256);
        assert_eq!(
            getsockopt(&ectx(), &store, &mut mem, IPT_SO_GET_INFO, 0, 83),
            Err(XtError::BadLength { expected: 84, given: 83 })
        );
    }

    #[test]
    fn entries_header_and_body() {
        let store = setup();
        let mut mem = VecMem::new(1024);
        let req =
            IptGetEntries { name: name_raw("filter"), ..Default::default() };
        mem.copy_out(0, req.as_bytes()).unwrap();

        let n =
            getsockopt(&ectx(), &store, &mut mem, IPT_SO_GET_ENTRIES, 0, 1024)
                .unwrap();
        assert_eq!(n, 40 + 632);

        let (hdr, _) = IptGetEntries::read_from_prefix(&mem.bytes).unwrap();
        assert_eq!(hdr.size, 632);
    }

    #[test]
    fn entries_too_small() {
        let store = setup();
        let mut mem = VecMem::new(1024);
        let req =
            IptGetEntries { name: name_raw("filter"), ..Default::default() };
        mem.copy_out(0, req.as_bytes()).unwrap();

        assert_eq!(
            get_entries(&ectx(), &store, &mut mem, 0, 40 + 631),
            Err(XtError::RespTooLarge { needed: 632, given: 631 })
        );
    }

    #[test]
    fn copy_faults() {
        let store = setup();
        let mut mem = VecMem::new(64);
        assert_eq!(
            get_info(&ectx(), &store, &mut mem, 0),
            Err(XtError::CopyinReq)
        );
        assert_eq!(
            set_replace(&ectx(), &store, &mem, 60, 96),
            Err(XtError::CopyinReq)
        );
        assert_eq!(
            set_replace(&ectx(), &store, &mem, u64::MAX, 1),
            Err(XtError::CopyinReq)
        );
    }

    #[test]
    fn unterminated_name() {
        let store = setup();
        let mut mem = VecMem::new(256);
        mem.bytes[..32].fill(b'a');
        assert_eq!(
            get_info(&ectx(), &store, &mut mem, 0),
            Err(XtError::BadName)
        );
    }

    #[test]
    fn unknown_opts() {
        let store = setup();
        let mut mem = VecMem::new(8);
        assert_eq!(
            getsockopt(&ectx(), &store, &mut mem, 66, 0, 8),
            Err(XtError::UnknownOpt(66))
        );
        assert_eq!(
            setsockopt(&ectx(), &store, &mem, 99, 0, 8),
            Err(XtError::UnknownOpt(99))
        );
        assert_eq!(
            setsockopt(&ectx(), &store, &mem, IPT_SO_SET_ADD_COUNTERS, 0, 8),
            Ok(())
        );
    }
}
