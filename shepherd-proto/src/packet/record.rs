use super::QueryType;
use crate::buffer::reader::ReaderError;
use crate::buffer::writer::WriterError;
use crate::buffer::BytePacketBuffer;
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum Record {
    Unknown {
        domain: String,
        qtype: u16,
        data_len: u16,
        ttl: u32,
    }, // 0
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: u32,
    }, // 1
    NS {
        domain: String,
        host: String,
        ttl: u32,
    }, // 2
    CNAME {
        domain: String,
        host: String,
        ttl: u32,
    }, // 5
    SOA {
        domain: String,
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
        ttl: u32,
    }, // 6
    PTR {
        domain: String,
        host: String,
        ttl: u32,
    }, // 12
    MX {
        domain: String,
        priority: u16,
        host: String,
        ttl: u32,
    }, // 15
    TXT {
        domain: String,
        data: String,
        ttl: u32,
    }, // 16
    AAAA {
        domain: String,
        addr: Ipv6Addr,
        ttl: u32,
    }, // 28
    SRV {
        domain: String,
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
        ttl: u32,
    }, // 33
    CAA {
        domain: String,
        flags: u8,
        tag: String,
        value: String,
        ttl: u32,
    }, // 257
}

impl Record {
    pub fn ttl(&self) -> u32 {
        match self {
            Self::Unknown { ttl, .. } => *ttl,
            Self::A { ttl, .. } => *ttl,
            Self::NS { ttl, .. } => *ttl,
            Self::CNAME { ttl, .. } => *ttl,
            Self::SOA { ttl, .. } => *ttl,
            Self::PTR { ttl, .. } => *ttl,
            Self::MX { ttl, .. } => *ttl,
            Self::TXT { ttl, .. } => *ttl,
            Self::AAAA { ttl, .. } => *ttl,
            Self::SRV { ttl, .. } => *ttl,
            Self::CAA { ttl, .. } => *ttl,
        }
    }

    pub fn domain(&self) -> &str {
        match self {
            Self::Unknown { domain, .. } => domain,
            Self::A { domain, .. } => domain,
            Self::NS { domain, .. } => domain,
            Self::CNAME { domain, .. } => domain,
            Self::SOA { domain, .. } => domain,
            Self::PTR { domain, .. } => domain,
            Self::MX { domain, .. } => domain,
            Self::TXT { domain, .. } => domain,
            Self::AAAA { domain, .. } => domain,
            Self::SRV { domain, .. } => domain,
            Self::CAA { domain, .. } => domain,
        }
    }

    pub fn rtype(&self) -> QueryType {
        match self {
            Self::Unknown { qtype, .. } => QueryType::Unknown(*qtype),
            Self::A { .. } => QueryType::A,
            Self::NS { .. } => QueryType::NS,
            Self::CNAME { .. } => QueryType::CNAME,
            Self::SOA { .. } => QueryType::SOA,
            Self::PTR { .. } => QueryType::PTR,
            Self::MX { .. } => QueryType::MX,
            Self::TXT { .. } => QueryType::TXT,
            Self::AAAA { .. } => QueryType::AAAA,
            Self::SRV { .. } => QueryType::SRV,
            Self::CAA { .. } => QueryType::CAA,
        }
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Record, ReaderError> {
        // NAME a domain name to which this resource record pertains.
        let domain = buffer.read_qname()?;

        // TYPE two octets containing one of the RR type codes.
        let qtype_num = buffer.read_u16()?;
        let qtype = QueryType::from_num(qtype_num);

        // CLASS two octets which specify the class of the data in RDATA.
        let _qclass = buffer.read_u16()?;

        // TTL a 32 bit unsigned integer that specifies the time interval
        // (in seconds) that the resource record may be cached.
        let ttl = buffer.read_u32()?;

        // RDLENGTH the length in octets of the RDATA field.
        let data_len = buffer.read_u16()?;

        match qtype {
            QueryType::A => {
                let raw_addr = buffer.read_u32()?;
                let addr = Ipv4Addr::from(raw_addr);

                Ok(Record::A { domain, addr, ttl })
            }
            QueryType::AAAA => {
                let mut octets = [0u8; 16];
                for octet in octets.iter_mut() {
                    *octet = buffer.read()?;
                }
                let addr = Ipv6Addr::from(octets);

                Ok(Record::AAAA { domain, addr, ttl })
            }
            QueryType::NS => {
                let host = buffer.read_qname()?;

                Ok(Record::NS { domain, host, ttl })
            }
            QueryType::CNAME => {
                let host = buffer.read_qname()?;

                Ok(Record::CNAME { domain, host, ttl })
            }
            QueryType::PTR => {
                let host = buffer.read_qname()?;

                Ok(Record::PTR { domain, host, ttl })
            }
            QueryType::SOA => {
                let mname = buffer.read_qname()?;
                let rname = buffer.read_qname()?;
                let serial = buffer.read_u32()?;
                let refresh = buffer.read_u32()?;
                let retry = buffer.read_u32()?;
                let expire = buffer.read_u32()?;
                let minimum = buffer.read_u32()?;

                Ok(Record::SOA {
                    domain,
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                    ttl,
                })
            }
            QueryType::MX => {
                let priority = buffer.read_u16()?;
                let host = buffer.read_qname()?;

                Ok(Record::MX {
                    domain,
                    priority,
                    host,
                    ttl,
                })
            }
            QueryType::TXT => {
                // TXT-DATA is one or more length-prefixed character strings.
                let mut data = Vec::with_capacity(data_len as usize);
                let mut remaining = data_len as usize;
                while remaining > 0 {
                    let chunk_len = buffer.read()? as usize;
                    remaining = remaining
                        .checked_sub(1 + chunk_len)
                        .ok_or(ReaderError::EndOfBuffer)?;
                    for _ in 0..chunk_len {
                        data.push(buffer.read()?);
                    }
                }
                let data = String::from_utf8_lossy(&data).into_owned();

                Ok(Record::TXT { domain, data, ttl })
            }
            QueryType::SRV => {
                let priority = buffer.read_u16()?;
                let weight = buffer.read_u16()?;
                let port = buffer.read_u16()?;
                let target = buffer.read_qname()?;

                Ok(Record::SRV {
                    domain,
                    priority,
                    weight,
                    port,
                    target,
                    ttl,
                })
            }
            QueryType::CAA => {
                let flags = buffer.read()?;
                let tag_len = buffer.read()? as usize;
                let value_len = (data_len as usize)
                    .checked_sub(2 + tag_len)
                    .ok_or(ReaderError::EndOfBuffer)?;
                let mut tag = Vec::with_capacity(tag_len);
                for _ in 0..tag_len {
                    tag.push(buffer.read()?);
                }
                let mut value = Vec::with_capacity(value_len);
                for _ in 0..value_len {
                    value.push(buffer.read()?);
                }

                Ok(Record::CAA {
                    domain,
                    flags,
                    tag: String::from_utf8_lossy(&tag).into_owned(),
                    value: String::from_utf8_lossy(&value).into_owned(),
                    ttl,
                })
            }
            QueryType::ANY | QueryType::Unknown(_) => {
                buffer.step(data_len as usize)?;

                Ok(Record::Unknown {
                    domain,
                    qtype: qtype_num,
                    data_len,
                    ttl,
                })
            }
        }
    }

    /// Writes the record preamble up to and including a zeroed RDLENGTH,
    /// returning the position to backfill once the RDATA size is known.
    fn write_preamble(
        &self,
        buffer: &mut BytePacketBuffer,
        qtype: QueryType,
        ttl: u32,
    ) -> Result<usize, WriterError> {
        buffer.write_qname(self.domain())?;
        buffer.write_u16(qtype.into_num())?;
        buffer.write_u16(1)?; // class IN
        buffer.write_u32(ttl)?;
        let pos = buffer.pos();
        buffer.write_u16(0)?;
        Ok(pos)
    }

    fn backfill_rdlength(buffer: &mut BytePacketBuffer, pos: usize) -> Result<(), WriterError> {
        let size = buffer.pos() - (pos + 2);
        buffer.set_u16(pos, size as u16)
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<usize, WriterError> {
        let start_pos = buffer.pos();

        match *self {
            Record::A { ref addr, ttl, .. } => {
                let pos = self.write_preamble(buffer, QueryType::A, ttl)?;
                buffer.write_raw(&addr.octets())?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::AAAA { ref addr, ttl, .. } => {
                let pos = self.write_preamble(buffer, QueryType::AAAA, ttl)?;
                buffer.write_raw(&addr.octets())?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::NS { ref host, ttl, .. } => {
                let pos = self.write_preamble(buffer, QueryType::NS, ttl)?;
                buffer.write_qname(host)?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::CNAME { ref host, ttl, .. } => {
                let pos = self.write_preamble(buffer, QueryType::CNAME, ttl)?;
                buffer.write_qname(host)?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::PTR { ref host, ttl, .. } => {
                let pos = self.write_preamble(buffer, QueryType::PTR, ttl)?;
                buffer.write_qname(host)?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::SOA {
                ref mname,
                ref rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ttl,
                ..
            } => {
                let pos = self.write_preamble(buffer, QueryType::SOA, ttl)?;
                buffer.write_qname(mname)?;
                buffer.write_qname(rname)?;
                buffer.write_u32(serial)?;
                buffer.write_u32(refresh)?;
                buffer.write_u32(retry)?;
                buffer.write_u32(expire)?;
                buffer.write_u32(minimum)?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::MX {
                priority,
                ref host,
                ttl,
                ..
            } => {
                let pos = self.write_preamble(buffer, QueryType::MX, ttl)?;
                buffer.write_u16(priority)?;
                buffer.write_qname(host)?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::TXT { ref data, ttl, .. } => {
                let pos = self.write_preamble(buffer, QueryType::TXT, ttl)?;
                let bytes = data.as_bytes();
                if bytes.is_empty() {
                    buffer.write_u8(0)?;
                } else {
                    for chunk in bytes.chunks(255) {
                        buffer.write_u8(chunk.len() as u8)?;
                        buffer.write_raw(chunk)?;
                    }
                }
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::SRV {
                priority,
                weight,
                port,
                ref target,
                ttl,
                ..
            } => {
                let pos = self.write_preamble(buffer, QueryType::SRV, ttl)?;
                buffer.write_u16(priority)?;
                buffer.write_u16(weight)?;
                buffer.write_u16(port)?;
                buffer.write_qname_plain(target)?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            Record::CAA {
                flags,
                ref tag,
                ref value,
                ttl,
                ..
            } => {
                let pos = self.write_preamble(buffer, QueryType::CAA, ttl)?;
                buffer.write_u8(flags)?;
                buffer.write_u8(tag.len() as u8)?;
                buffer.write_raw(tag.as_bytes())?;
                buffer.write_raw(value.as_bytes())?;
                Self::backfill_rdlength(buffer, pos)?;
            }
            // Unknown records are parsed for completeness but never
            // serialised.
            Record::Unknown { .. } => {}
        }

        Ok(buffer.pos() - start_pos)
    }
}
