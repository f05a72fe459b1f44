#![no_main]

use blockwire::protocol::packets::{Packet, PacketKind};
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the packet kind, the rest is its body
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let kind = PacketKind::ALL[selector as usize % PacketKind::ALL.len()];
    let mut body = Bytes::copy_from_slice(body);
    let _ = Packet::decode(kind, i32::from(selector), &mut body);
});
