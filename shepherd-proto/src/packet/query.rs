use super::header::{Header, ResponseCode};
use super::question::Question;
use super::record::Record;
use crate::buffer::{BytePacketBuffer, ReaderError, WriterError};

/// A parsed query datagram: the header, the single question, and the raw
/// question-section bytes. The raw bytes are echoed verbatim into the
/// reply so that a mixed-case qname comes back exactly as the client sent
/// it, while `question.name` holds the lower-cased form used for lookups.
#[derive(Clone, Debug)]
pub struct Query {
    pub header: Header,
    pub question: Question,
    raw_question: Vec<u8>,
}

impl Query {
    /// Reads a query from a received datagram. Responses, multi-question
    /// packets and truncated or malformed question sections are rejected;
    /// the server drops those silently.
    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        let header = Header::read(buffer)?;
        if header.response {
            return Err(ReaderError::UnexpectedResponse);
        }
        if header.questions != 1 {
            return Err(ReaderError::UnexpectedQuestionCount(header.questions));
        }

        let start = buffer.pos();
        let question = Question::read(buffer)?;
        let raw_question = buffer.get_range(start, buffer.pos() - start)?.to_vec();

        Ok(Self {
            header,
            question,
            raw_question,
        })
    }

    /// Canonical form of the query name: lower-case with a trailing dot.
    pub fn fqdn(&self) -> String {
        if self.question.name.is_empty() {
            String::from(".")
        } else {
            format!("{}.", self.question.name)
        }
    }

    pub fn response(&self, code: ResponseCode) -> Response {
        Response {
            header: Header::authoritative_response(&self.header, code),
            raw_question: self.raw_question.clone(),
            answers: Vec::new(),
            authorities: Vec::new(),
        }
    }
}

/// An authoritative reply under construction.
#[derive(Clone, Debug)]
pub struct Response {
    pub header: Header,
    raw_question: Vec<u8>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
}

impl Response {
    pub fn with_answers(mut self, records: Vec<Record>) -> Self {
        self.answers = records;
        self
    }

    pub fn with_authorities(mut self, records: Vec<Record>) -> Self {
        self.authorities = records;
        self
    }

    pub fn create_buffer(&mut self) -> Result<BytePacketBuffer, WriterError> {
        let mut buffer = BytePacketBuffer::default();
        self.header.questions = 1;
        self.header.answers = self.answers.len() as u16;
        self.header.authoritative_entries = self.authorities.len() as u16;
        self.header.resource_entries = 0;

        self.header.write(&mut buffer)?;
        buffer.write_raw(&self.raw_question)?;

        for rec in &self.answers {
            rec.write(&mut buffer)?;
        }
        for rec in &self.authorities {
            rec.write(&mut buffer)?;
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::Query;
    use crate::buffer::{BytePacketBuffer, ReaderError};
    use crate::packet::header::{Header, ResponseCode};
    use crate::packet::question::Question;
    use crate::packet::record::Record;
    use crate::packet::{DnsPacket, QueryType};
    use std::net::Ipv4Addr;

    fn query_buffer(id: u16, name: &str, qtype: QueryType) -> BytePacketBuffer {
        let mut packet = DnsPacket::new(Header::question(id))
            .with_question(Question::new(name.into(), qtype));
        let buffer = packet.create_buffer().unwrap();
        BytePacketBuffer::new(buffer.buf, buffer.pos)
    }

    #[test]
    fn should_read_query() {
        let mut buffer = query_buffer(11, "www.example.com", QueryType::A);
        let query = Query::read(&mut buffer).unwrap();
        assert_eq!(query.header.id, 11);
        assert_eq!(query.question.name, "www.example.com");
        assert_eq!(query.fqdn(), "www.example.com.");
    }

    #[test]
    fn should_reject_response_packet() {
        let mut packet = DnsPacket::new(Header::response(1))
            .with_question(Question::new("www.example.com".into(), QueryType::A));
        let buffer = packet.create_buffer().unwrap();
        let mut buffer = BytePacketBuffer::new(buffer.buf, buffer.pos);
        assert_eq!(
            Query::read(&mut buffer).unwrap_err(),
            ReaderError::UnexpectedResponse
        );
    }

    #[test]
    fn should_reject_zero_questions() {
        let mut packet = DnsPacket::new(Header::question(1));
        let buffer = packet.create_buffer().unwrap();
        let mut buffer = BytePacketBuffer::new(buffer.buf, buffer.pos);
        assert_eq!(
            Query::read(&mut buffer).unwrap_err(),
            ReaderError::UnexpectedQuestionCount(0)
        );
    }

    #[test]
    fn should_reject_truncated_question() {
        let mut packet = DnsPacket::new(Header::question(1))
            .with_question(Question::new("www.example.com".into(), QueryType::A));
        let buffer = packet.create_buffer().unwrap();
        // cut the datagram in the middle of the question
        let mut buffer = BytePacketBuffer::new(buffer.buf, 16);
        assert_eq!(
            Query::read(&mut buffer).unwrap_err(),
            ReaderError::EndOfBuffer
        );
    }

    #[test]
    fn should_echo_question_bytes_verbatim() {
        // a mixed-case name survives the response untouched
        let mut packet = DnsPacket::new(Header::question(7))
            .with_question(Question::new("WwW.ExAmPle.cOm".into(), QueryType::A));
        let request = packet.create_buffer().unwrap();
        let mut parse = BytePacketBuffer::new(request.buf, request.pos);
        let query = Query::read(&mut parse).unwrap();
        assert_eq!(query.question.name, "www.example.com");

        let mut response = query.response(ResponseCode::NoError);
        let buffer = response.create_buffer().unwrap();
        assert_eq!(&buffer.buf[12..request.pos], &request.buf[12..request.pos]);
    }

    #[test]
    fn should_build_answer_section() {
        let mut buffer = query_buffer(3, "app.example.com", QueryType::A);
        let query = Query::read(&mut buffer).unwrap();

        let mut response = query.response(ResponseCode::NoError).with_answers(vec![
            Record::A {
                domain: "app.example.com".into(),
                addr: Ipv4Addr::new(10, 0, 0, 1),
                ttl: 60,
            },
        ]);
        let buffer = response.create_buffer().unwrap();
        let parsed =
            DnsPacket::try_from(BytePacketBuffer::new(buffer.buf, buffer.pos)).unwrap();
        assert_eq!(parsed.header.id, 3);
        assert!(parsed.header.response);
        assert!(parsed.header.authoritative_answer);
        assert_eq!(parsed.header.response_code, ResponseCode::NoError);
        assert_eq!(parsed.answers.len(), 1);
        assert!(parsed.authorities.is_empty());
    }
}
