use super::error::HandleError;
use super::selection;
use crate::model::record::StoredRecord;
use crate::repository::cache::LookupCache;
use crate::repository::ratelimit::RateLimiter;
use crate::repository::store::RecordStore;
use shepherd_proto::buffer::BytePacketBuffer;
use shepherd_proto::packet::header::ResponseCode;
use shepherd_proto::packet::query::{Query, Response};
use shepherd_proto::packet::question::DnsClass;
use shepherd_proto::packet::record::Record;
use shepherd_server::Message;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct DnsHandler {
    store: Arc<dyn RecordStore + Send + Sync>,
    cache: Arc<LookupCache>,
    limiter: Arc<RateLimiter>,
}

impl DnsHandler {
    pub fn new(
        store: Arc<dyn RecordStore + Send + Sync>,
        cache: Arc<LookupCache>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            store,
            cache,
            limiter,
        }
    }

    async fn lookup(&self, fqdn: &str) -> Result<Vec<StoredRecord>, HandleError> {
        if let Some(records) = self.cache.request(fqdn).await {
            return Ok(records);
        }
        let records = self.store.lookup(fqdn).await?;
        self.cache.persist(fqdn, records.clone()).await;
        Ok(records)
    }

    async fn try_handle(
        &self,
        origin: &SocketAddr,
        query: &Query,
    ) -> Result<Response, HandleError> {
        if !self.limiter.check(origin.ip()) {
            tracing::debug!("rate limited");
            return Ok(query.response(ResponseCode::Refused));
        }
        if query.question.qclass != DnsClass::Internet {
            return Ok(query.response(ResponseCode::NotImplemented));
        }

        let fqdn = query.fqdn();
        let records = self.lookup(&fqdn).await?;
        let zone = match self.store.resolve_zone(&fqdn).await? {
            Some(zone) => zone,
            // not our name: NXDOMAIN with nothing else in the packet
            None => return Ok(query.response(ResponseCode::NameError)),
        };

        let answers = selection::select(
            &records,
            query.question.qtype,
            Some(origin.ip()),
            &mut rand::thread_rng(),
        );
        let answers = to_wire(answers);
        if answers.is_empty() {
            let authority = to_wire(self.store.authority(&zone).await?);
            return Ok(query
                .response(ResponseCode::NoError)
                .with_authorities(authority));
        }
        Ok(query.response(ResponseCode::NoError).with_answers(answers))
    }
}

fn to_wire(records: Vec<StoredRecord>) -> Vec<Record> {
    records
        .into_iter()
        .filter_map(|record| match record.to_record() {
            Some(wire) => Some(wire),
            None => {
                tracing::warn!("record {} has an unreadable value, skipped", record.id);
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl shepherd_server::Handler for DnsHandler {
    #[tracing::instrument(skip_all, fields(origin = ?message.address, id = tracing::field::Empty))]
    async fn handle(&self, message: Message) -> Option<Message> {
        let Message {
            address,
            buffer,
            size,
        } = message;

        if size < 12 {
            tracing::debug!("datagram shorter than a header");
            return None;
        }
        let mut buffer = BytePacketBuffer::new(buffer, size);
        let query = match Query::read(&mut buffer) {
            Ok(query) => query,
            Err(error) => {
                tracing::debug!("unable to read query: {error:?}");
                return None;
            }
        };

        tracing::Span::current().record("id", query.header.id);

        let mut response = match self.try_handle(&address, &query).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("unable to build response: {error:?}");
                query.response(ResponseCode::ServerFailure)
            }
        };
        match response.create_buffer() {
            Ok(buffer) => Some(Message {
                address,
                buffer: buffer.buf,
                size: buffer.pos,
            }),
            Err(error) => {
                tracing::error!("unable to serialise response: {error:?}");
                let mut failure = query.response(ResponseCode::ServerFailure);
                failure.create_buffer().ok().map(|buffer| Message {
                    address,
                    buffer: buffer.buf,
                    size: buffer.pos,
                })
            }
        }
    }
}
