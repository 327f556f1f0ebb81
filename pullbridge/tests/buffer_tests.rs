// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for buffer handles and scoped byte access.
//!
//! Every test ends by checking the mock's reference table: each reference a
//! handle took must have been given back exactly once, and each map must have
//! been matched by one unmap.

mod common;

use std::{panic, sync::Arc};

use common::{MockApi, MockBuffer, setup_logging};
use pullbridge::{BufferHandle, Error, MapMode};

#[derive(Debug)]
#[allow(dead_code)]
enum BodyError {
    Bridge(Error),
    Rejected(u8),
}

impl From<Error> for BodyError {
    fn from(error: Error) -> Self {
        BodyError::Bridge(error)
    }
}

/// Creates a buffer the way a pulled sample would hold it, plus an owning
/// handle on it. The returned raw buffer still carries the sample's reference.
fn pulled(api: &Arc<MockApi>, data: Vec<u8>) -> (MockBuffer, BufferHandle<MockApi>) {
    let raw = api.create(data, None);
    let handle = unsafe { BufferHandle::acquire(api.clone(), raw, true) };
    (raw, handle)
}

/// Drops the sample's own reference.
fn release_sample(api: &MockApi, raw: MockBuffer) {
    unsafe { pullbridge::NativeBufferApi::buffer_unref(api, raw) };
}

fn assert_balanced(api: &MockApi) {
    assert_eq!(api.live_references(), 0);
    assert_eq!(api.over_released(), 0);
    assert_eq!(api.maps(), api.unmaps());
}

#[test]
fn handle_outlives_the_sample_it_came_from() {
    setup_logging();
    let api = MockApi::new();
    let (raw, handle) = pulled(&api, vec![7; 32]);
    assert_eq!(api.references(raw), 2);

    release_sample(&api, raw);
    assert_eq!(handle.len(), 32);
    assert_eq!(handle.to_vec().unwrap(), vec![7; 32]);

    drop(handle);
    assert_eq!(api.refs(), 1);
    assert_eq!(api.unrefs(), 2);
    assert_balanced(&api);
}

#[test]
fn release_is_idempotent() {
    setup_logging();
    let api = MockApi::new();
    let (raw, mut handle) = pulled(&api, vec![1, 2, 3]);
    release_sample(&api, raw);

    handle.release();
    handle.release();
    assert!(handle.is_released());
    assert!(!handle.owns_reference());
    assert_eq!(handle.len(), 0);
    assert_eq!(handle.pts(), None);
    assert!(matches!(handle.with_bytes(|_| ()), Err(Error::Released)));
    assert!(matches!(handle.add_ref(), Err(Error::Released)));

    drop(handle);
    assert_balanced(&api);
}

#[test]
fn borrowed_handles_never_release() {
    setup_logging();
    let api = MockApi::new();
    let raw = api.create(vec![9; 4], None);

    let alias = unsafe { BufferHandle::acquire(api.clone(), raw, false) };
    assert!(!alias.owns_reference());
    assert_eq!(alias.with_bytes(|bytes| bytes.to_vec()).unwrap(), vec![9; 4]);
    drop(alias);

    assert_eq!(api.references(raw), 1);
    assert_eq!(api.refs(), 0);
    assert_eq!(api.unrefs(), 0);
    release_sample(&api, raw);
    assert_balanced(&api);
}

#[test]
fn add_ref_gives_an_independent_owner() {
    setup_logging();
    let api = MockApi::new();
    let (raw, first) = pulled(&api, vec![5; 8]);
    release_sample(&api, raw);

    let second = first.add_ref().unwrap();
    assert_eq!(api.references(raw), 2);
    drop(first);
    assert_eq!(second.to_vec().unwrap(), vec![5; 8]);
    drop(second);
    assert_balanced(&api);
}

#[test]
fn mapping_is_undone_after_normal_return() {
    setup_logging();
    let api = MockApi::new();
    let (raw, handle) = pulled(&api, (0..16).collect());
    release_sample(&api, raw);

    let sum = handle
        .with_bytes(|bytes| bytes.iter().map(|b| u32::from(*b)).sum::<u32>())
        .unwrap();
    assert_eq!(sum, 120);
    assert_eq!(api.maps(), 1);
    assert_eq!(api.unmaps(), 1);

    drop(handle);
    assert_balanced(&api);
}

#[test]
fn mapping_is_undone_when_the_body_returns_early() {
    setup_logging();
    let api = MockApi::new();
    let (raw, handle) = pulled(&api, vec![0, 0, 3, 4]);
    release_sample(&api, raw);

    let first_nonzero = |handle: &BufferHandle<MockApi>| -> Result<u8, BodyError> {
        handle.try_with_bytes(|bytes| {
            for byte in bytes {
                if *byte != 0 {
                    return Err(BodyError::Rejected(*byte));
                }
            }
            Ok(0)
        })
    };

    assert!(matches!(first_nonzero(&handle), Err(BodyError::Rejected(3))));
    assert_eq!(api.maps(), 1);
    assert_eq!(api.unmaps(), 1);

    drop(handle);
    assert_balanced(&api);
}

#[test]
fn mapping_is_undone_when_the_body_panics() {
    setup_logging();
    let api = MockApi::new();
    let (raw, handle) = pulled(&api, vec![1; 64]);
    release_sample(&api, raw);

    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        handle.with_bytes(|bytes| {
            if bytes[0] == 1 {
                panic!("body failed halfway");
            }
            bytes.len()
        })
    }));
    assert!(result.is_err());
    assert_eq!(api.maps(), api.unmaps());

    // The handle is still usable after the unwind.
    assert_eq!(handle.with_bytes(|bytes| bytes.len()).unwrap(), 64);
    drop(handle);
    assert_balanced(&api);
}

#[test]
fn handle_is_released_when_a_panic_unwinds_through_its_owner() {
    setup_logging();
    let api = MockApi::new();
    let raw = api.create(vec![2; 8], None);

    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let handle = unsafe { BufferHandle::acquire(api.clone(), raw, true) };
        handle.with_bytes(|_| -> usize { panic!("owner unwinding") }).ok();
    }));
    assert!(result.is_err());

    release_sample(&api, raw);
    assert_balanced(&api);
}

#[test]
fn map_failure_leaves_the_handle_usable() {
    setup_logging();
    let api = MockApi::new();
    let (raw, handle) = pulled(&api, vec![4; 4]);
    release_sample(&api, raw);

    api.set_fail_maps(true);
    let failed = handle.with_bytes(|bytes| bytes.len());
    assert!(matches!(
        failed,
        Err(Error::MapFailed {
            mode: MapMode::Read
        })
    ));
    assert_eq!(api.maps(), 0);
    assert_eq!(api.unmaps(), 0);

    api.set_fail_maps(false);
    assert_eq!(handle.with_bytes(|bytes| bytes.len()).unwrap(), 4);
    drop(handle);
    assert_balanced(&api);
}

#[test]
fn allocated_buffers_are_writable() {
    setup_logging();
    let api = MockApi::new();
    let mut handle = BufferHandle::allocate(api.clone(), 6).unwrap();
    assert!(handle.is_writable());

    handle
        .with_mutable_bytes(|bytes| bytes.copy_from_slice(b"pullbr"))
        .unwrap();
    assert_eq!(handle.to_vec().unwrap(), b"pullbr".to_vec());

    drop(handle);
    assert_balanced(&api);
}

#[test]
fn shared_buffers_refuse_write_access() {
    setup_logging();
    let api = MockApi::new();
    let (raw, mut handle) = pulled(&api, vec![0; 4]);

    // The sample still holds a reference.
    assert!(!handle.is_writable());
    assert!(matches!(
        handle.with_mutable_bytes(|bytes| bytes.fill(1)),
        Err(Error::NotWritable)
    ));
    assert_eq!(api.maps(), 0);

    release_sample(&api, raw);
    handle
        .try_with_mutable_bytes(|bytes| -> Result<(), BodyError> {
            bytes.fill(1);
            Ok(())
        })
        .unwrap();
    assert_eq!(api.contents(raw), vec![1; 4]);

    drop(handle);
    assert_balanced(&api);
}

#[test]
fn into_raw_hands_the_reference_over() {
    setup_logging();
    let api = MockApi::new();
    let handle = BufferHandle::allocate(api.clone(), 10).unwrap();

    let raw = handle.into_raw().unwrap();
    assert_eq!(api.references(raw), 1);
    assert_eq!(api.unrefs(), 0);

    // The receiving side releases it.
    release_sample(&api, raw);
    assert_balanced(&api);
}

#[test]
fn empty_buffers_map_to_empty_slices() {
    setup_logging();
    let api = MockApi::new();
    let (raw, handle) = pulled(&api, Vec::new());
    release_sample(&api, raw);

    assert!(handle.is_empty());
    assert!(handle.with_bytes(<[u8]>::is_empty).unwrap());
    drop(handle);
    assert_balanced(&api);
}
