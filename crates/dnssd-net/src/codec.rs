//! Packet codec on top of `hickory-proto`.
//!
//! Converts between the decoded [`Packet`] model and RFC 1035 wire bytes.
//! Record types outside the DNS-SD set are dropped on decode.

use dnssd_core::{CodecError, Packet, Question, Record, RecordData, RecordKind};
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::{rdata, DNSClass, Name, RData, RecordType};

/// Encode a decoded packet into wire bytes.
pub fn encode(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    let mut message = Message::new();
    // mDNS uses a zero transaction id for multicast messages (RFC 6762 §18.1).
    message.set_id(0);
    if packet.is_response {
        message.set_message_type(MessageType::Response);
        message.set_authoritative(true);
    } else {
        message.set_message_type(MessageType::Query);
    }

    for question in &packet.questions {
        message.add_query(Query::query(
            encode_name(&question.name)?,
            kind_to_type(question.kind),
        ));
    }
    for record in &packet.answers {
        message.add_answer(encode_record(record)?);
    }
    for record in &packet.additionals {
        message.add_additional(encode_record(record)?);
    }

    message
        .to_vec()
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode wire bytes into a packet.
pub fn decode(buf: &[u8]) -> Result<Packet, CodecError> {
    let message = Message::from_vec(buf).map_err(|e| CodecError::Decode(e.to_string()))?;

    let questions = message
        .queries()
        .iter()
        .filter_map(|query| {
            Some(Question {
                name: decode_name(query.name()),
                kind: type_to_kind(query.query_type())?,
            })
        })
        .collect();

    Ok(Packet {
        is_response: message.message_type() == MessageType::Response,
        questions,
        answers: message.answers().iter().filter_map(decode_record).collect(),
        additionals: message
            .additionals()
            .iter()
            .filter_map(decode_record)
            .collect(),
    })
}

fn encode_name(name: &str) -> Result<Name, CodecError> {
    Name::from_ascii(name).map_err(|e| CodecError::Encode(format!("bad name {name:?}: {e}")))
}

/// Wire names come back fully qualified; strip the root dot.
fn decode_name(name: &Name) -> String {
    let mut s = name.to_utf8();
    if s.ends_with('.') {
        s.pop();
    }
    s
}

fn kind_to_type(kind: RecordKind) -> RecordType {
    match kind {
        RecordKind::Ptr => RecordType::PTR,
        RecordKind::Srv => RecordType::SRV,
        RecordKind::Txt => RecordType::TXT,
        RecordKind::A => RecordType::A,
        RecordKind::Aaaa => RecordType::AAAA,
        RecordKind::Any => RecordType::ANY,
    }
}

fn type_to_kind(rtype: RecordType) -> Option<RecordKind> {
    match rtype {
        RecordType::PTR => Some(RecordKind::Ptr),
        RecordType::SRV => Some(RecordKind::Srv),
        RecordType::TXT => Some(RecordKind::Txt),
        RecordType::A => Some(RecordKind::A),
        RecordType::AAAA => Some(RecordKind::Aaaa),
        RecordType::ANY => Some(RecordKind::Any),
        _ => None,
    }
}

fn encode_record(record: &Record) -> Result<hickory_proto::rr::Record, CodecError> {
    let name = encode_name(&record.name)?;
    let rdata = match &record.data {
        RecordData::Ptr(target) => RData::PTR(rdata::PTR(encode_name(target)?)),
        RecordData::Srv { port, target } => {
            RData::SRV(rdata::SRV::new(0, 0, *port, encode_name(target)?))
        }
        RecordData::Txt(entries) => {
            RData::TXT(rdata::TXT::from_bytes(
                entries.iter().map(|entry| entry.as_slice()).collect(),
            ))
        }
        RecordData::A(addr) => RData::A(rdata::A::from(*addr)),
        RecordData::Aaaa(addr) => RData::AAAA(rdata::AAAA::from(*addr)),
    };
    let mut wire = hickory_proto::rr::Record::from_rdata(name, record.ttl, rdata);
    wire.set_dns_class(DNSClass::IN);
    Ok(wire)
}

fn decode_record(record: &hickory_proto::rr::Record) -> Option<Record> {
    let name = decode_name(record.name());
    let ttl = record.ttl();
    let data = match record.data() {
        RData::PTR(ptr) => RecordData::Ptr(decode_name(&ptr.0)),
        RData::SRV(srv) => RecordData::Srv {
            port: srv.port(),
            target: decode_name(srv.target()),
        },
        RData::TXT(txt) => RecordData::Txt(
            txt.txt_data()
                .iter()
                .map(|entry| entry.to_vec())
                .collect(),
        ),
        RData::A(a) => RecordData::A(a.0),
        RData::AAAA(aaaa) => RecordData::Aaaa(aaaa.0),
        _ => return None,
    };
    Some(Record { name, ttl, data })
}
