use super::QueryType;
use crate::buffer::reader::ReaderError;
use crate::buffer::writer::WriterError;
use crate::buffer::BytePacketBuffer;

/// CLASS fields appear in resource records.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DnsClass {
    /// IN - the Internet
    Internet,
    /// CS - the CSNET class (Obsolete - used only for examples in some obsolete RFCs)
    Csnet,
    /// CH - the CHAOS class
    Chaos,
    /// HS - Hesiod [Dyer 87]
    Hesiod,
    /// Anything else. Kept around so that an unknown class can be answered
    /// with NOTIMP instead of being dropped as malformed.
    Unknown(u16),
}

impl Default for DnsClass {
    fn default() -> Self {
        Self::Internet
    }
}

impl DnsClass {
    pub fn into_num(self) -> u16 {
        match self {
            Self::Internet => 1,
            Self::Csnet => 2,
            Self::Chaos => 3,
            Self::Hesiod => 4,
            Self::Unknown(other) => other,
        }
    }

    pub fn from_num(num: u16) -> Self {
        match num {
            1 => Self::Internet,
            2 => Self::Csnet,
            3 => Self::Chaos,
            4 => Self::Hesiod,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// QNAME a domain name represented as a sequence of labels, where each
    /// label consists of a length octet followed by that number of octets.
    pub name: String,
    /// QTYPE a two octet code which specifies the type of the query.
    pub qtype: QueryType,
    /// QCLASS a two octet code that specifies the class of the query.
    /// For example, the QCLASS field is IN for the Internet.
    pub qclass: DnsClass,
}

impl Default for Question {
    fn default() -> Self {
        Self {
            name: String::default(),
            qtype: QueryType::Unknown(0),
            qclass: DnsClass::Internet,
        }
    }
}

impl Question {
    pub fn new(name: String, qtype: QueryType) -> Self {
        Self {
            name,
            qtype,
            qclass: Default::default(),
        }
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        let name = buffer.read_qname()?;
        let qtype = QueryType::from_num(buffer.read_u16()?); // qtype
        let qclass = DnsClass::from_num(buffer.read_u16()?); // class

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<(), WriterError> {
        buffer.write_qname(&self.name)?;

        buffer.write_u16(self.qtype.into_num())?;
        buffer.write_u16(self.qclass.into_num())?;

        Ok(())
    }
}
