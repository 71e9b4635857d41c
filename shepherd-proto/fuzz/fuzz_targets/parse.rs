#![no_main]

use shepherd_proto::buffer::BytePacketBuffer;
use shepherd_proto::packet::query::Query;
use shepherd_proto::packet::DnsPacket;

libfuzzer_sys::fuzz_target!(|data: &[u8]| {
    let mut buf = [0u8; 512];
    let size = data.len().min(512);
    buf[..size].copy_from_slice(&data[..size]);

    let mut buffer = BytePacketBuffer::new(buf, size);
    let _ = Query::read(&mut buffer);

    let buffer = BytePacketBuffer::new(buf, size);
    let _ = DnsPacket::try_from(buffer);
});
