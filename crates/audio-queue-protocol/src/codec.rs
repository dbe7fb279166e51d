use crate::{Message, MessageType, ProtocolError, Result, MAX_MESSAGE_SIZE};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Length of the big-endian frame length prefix
const LENGTH_PREFIX: usize = 4;

/// Codec for encoding/decoding messages with length-prefixed framing
///
/// Frame format: [4-byte length (big-endian)] [1-byte message type] [payload]
///
/// The length covers the type byte and the payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut length_bytes = [0u8; LENGTH_PREFIX];
        length_bytes.copy_from_slice(&src[..LENGTH_PREFIX]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if length == 0 {
            return Err(ProtocolError::Protocol("empty frame".to_string()));
        }
        if length > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(length));
        }

        if src.len() < LENGTH_PREFIX + length {
            src.reserve(LENGTH_PREFIX + length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let msg_type_byte = src.get_u8();
        let payload = src.split_to(length - 1);

        let msg_type = MessageType::from_u8(msg_type_byte)
            .ok_or(ProtocolError::InvalidMessageType(msg_type_byte))?;

        let message = match msg_type {
            MessageType::ClaimTask => Message::ClaimTask(bincode::deserialize(&payload)?),
            MessageType::TaskDone => Message::TaskDone(bincode::deserialize(&payload)?),
            MessageType::Heartbeat => Message::Heartbeat(bincode::deserialize(&payload)?),
            MessageType::StoreResult => Message::StoreResult(bincode::deserialize(&payload)?),
            MessageType::Ping => Message::Ping(bincode::deserialize(&payload)?),
            MessageType::Ack => Message::Ack(bincode::deserialize(&payload)?),
            MessageType::Nack => Message::Nack(bincode::deserialize(&payload)?),
        };

        Ok(Some(message))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let payload = match &item {
            Message::ClaimTask(req) => bincode::serialize(req)?,
            Message::TaskDone(req) => bincode::serialize(req)?,
            Message::Heartbeat(req) => bincode::serialize(req)?,
            Message::StoreResult(req) => bincode::serialize(req)?,
            Message::Ping(req) => bincode::serialize(req)?,
            Message::Ack(resp) => bincode::serialize(resp)?,
            Message::Nack(resp) => bincode::serialize(resp)?,
        };

        let total_length = 1 + payload.len();
        if total_length > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(total_length));
        }

        dst.reserve(LENGTH_PREFIX + total_length);
        dst.put_u32(total_length as u32);
        dst.put_u8(item.message_type().as_u8());
        dst.put_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AckResponse, ClaimTaskRequest, NackResponse, PingRequest};
    use audio_queue_core::{TaskArguments, TaskMessage};
    use proptest::prelude::*;
    use serde_json::json;

    fn claim_reply() -> (TaskMessage, Message) {
        let task = TaskMessage::new(
            "audio.audio_length",
            &TaskArguments::positional(vec![json!("https://example.test/clip.wav")]),
        )
        .unwrap();
        let message = Message::Ack(AckResponse {
            task: Some(task.clone()),
            message: None,
        });
        (task, message)
    }

    #[test]
    fn test_claim_reply_carries_task() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();
        let (task, message) = claim_reply();

        codec.encode(message, &mut buffer).unwrap();

        match codec.decode(&mut buffer).unwrap() {
            Some(Message::Ack(AckResponse { task: Some(decoded), .. })) => {
                assert_eq!(decoded.id, task.id);
                assert_eq!(decoded.name, task.name);
                assert_eq!(decoded.arguments().unwrap(), task.arguments().unwrap());
            }
            other => panic!("Wrong message: {:?}", other),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_message() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();

        codec
            .encode(
                Message::ClaimTask(ClaimTaskRequest {
                    worker_id: "w-1".into(),
                    task_names: vec!["audio.audio_length".into()],
                }),
                &mut buffer,
            )
            .unwrap();

        let full_len = buffer.len();
        let mut partial = BytesMut::from(&buffer[..full_len / 2]);

        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();

        codec
            .encode(Message::Ping(PingRequest { client: "a".into() }), &mut buffer)
            .unwrap();
        codec
            .encode(Message::Nack(NackResponse { error: "busy".into() }), &mut buffer)
            .unwrap();

        assert!(matches!(codec.decode(&mut buffer).unwrap(), Some(Message::Ping(_))));
        match codec.decode(&mut buffer).unwrap() {
            Some(Message::Nack(nack)) => assert_eq!(nack.error, "busy"),
            other => panic!("Wrong message: {:?}", other),
        }
        assert!(codec.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_invalid_message_type() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();
        buffer.put_u32(1);
        buffer.put_u8(42);

        match codec.decode(&mut buffer) {
            Err(ProtocolError::InvalidMessageType(42)) => {}
            other => panic!("Expected InvalidMessageType, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_and_empty_frames() {
        let mut codec = MessageCodec;

        let mut oversized = BytesMut::new();
        oversized.put_u32((MAX_MESSAGE_SIZE + 1) as u32);
        assert!(matches!(
            codec.decode(&mut oversized),
            Err(ProtocolError::MessageTooLarge(_))
        ));

        let mut empty = BytesMut::new();
        empty.put_u32(0);
        assert!(matches!(codec.decode(&mut empty), Err(ProtocolError::Protocol(_))));
    }

    proptest! {
        #[test]
        fn test_arbitrary_chunking_yields_one_message(split in 0usize..512) {
            let mut codec = MessageCodec;
            let mut encoded = BytesMut::new();
            let (task, message) = claim_reply();
            codec.encode(message, &mut encoded).unwrap();

            let split = split.min(encoded.len());
            let mut buffer = BytesMut::from(&encoded[..split]);
            let mut decoded = codec.decode(&mut buffer).unwrap();
            if split < encoded.len() {
                prop_assert!(decoded.is_none());
                buffer.extend_from_slice(&encoded[split..]);
                decoded = codec.decode(&mut buffer).unwrap();
            }

            match decoded {
                Some(Message::Ack(AckResponse { task: Some(got), .. })) => prop_assert_eq!(got.id, task.id),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
