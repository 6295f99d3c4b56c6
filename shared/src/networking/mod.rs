pub mod error;
pub mod master;
pub mod result;
pub mod worker;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use self::result::NetworkingResult;

/// Bumped whenever the wire format changes; both ends refuse a mismatch
/// during the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// One framed message as it comes off the wire: a JSON envelope followed by
/// an optional binary payload (scene blob, pixel data).
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub message_length: u32,
    pub json_length: u32,
    pub json_message: String,
    pub data: Vec<u8>,
}

/// Frames and sends one message: `[total u32][json u32][json][binary]`,
/// lengths big-endian.
pub async fn send_message<S>(
    stream: &mut S,
    json_message: &[u8],
    data: Option<&[u8]>,
) -> NetworkingResult<()>
where
    S: AsyncWrite + Unpin,
{
    let json_message_size = json_message.len() as u32;
    let data_size = match data {
        Some(data) => data.len() as u32,
        None => 0,
    };
    let total_message_size = json_message_size + data_size;

    let mut buffer = Vec::new();
    buffer.extend_from_slice(&total_message_size.to_be_bytes());
    buffer.extend_from_slice(&json_message_size.to_be_bytes());
    buffer.extend_from_slice(json_message);
    if let Some(data) = data {
        buffer.extend_from_slice(data);
    };

    stream.write_all(&buffer).await?;
    Ok(stream.flush().await?)
}

pub async fn read_message_length<S>(stream: &mut S) -> NetworkingResult<u32>
where
    S: AsyncRead + Unpin,
{
    let mut length_bytes = [0u8; 4];
    stream.read_exact(&mut length_bytes).await?;
    Ok(u32::from_be_bytes(length_bytes))
}

pub async fn read_json_message<S>(stream: &mut S, length: usize) -> NetworkingResult<String>
where
    S: AsyncRead + Unpin,
{
    let mut json_message = vec![0u8; length];
    stream.read_exact(&mut json_message).await?;
    Ok(String::from_utf8_lossy(&json_message).to_string())
}

pub async fn read_binary_data<S>(stream: &mut S, length: usize) -> NetworkingResult<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut data_message = vec![0u8; length];
    stream.read_exact(&mut data_message).await?;
    Ok(data_message)
}

pub async fn read_message_raw<S>(stream: &mut S) -> NetworkingResult<RawMessage>
where
    S: AsyncRead + Unpin,
{
    let message_length = read_message_length(stream).await?;
    let json_length = read_message_length(stream).await?;
    let json_message = read_json_message(stream, json_length as usize).await?;
    let data = read_binary_data(stream, (message_length - json_length) as usize).await?;

    Ok(RawMessage {
        message_length,
        json_length,
        json_message,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn framed_message_round_trips() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);

        send_message(&mut tx, br#"{"hello":1}"#, Some(&[1, 2, 3, 4]))
            .await
            .unwrap();

        let raw = read_message_raw(&mut rx).await.unwrap();
        assert_eq!(raw.json_message, r#"{"hello":1}"#);
        assert_eq!(raw.data, vec![1, 2, 3, 4]);
        assert_eq!(raw.json_length, 11);
        assert_eq!(raw.message_length, 15);
    }

    #[tokio::test]
    async fn message_without_payload_has_empty_data() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);

        send_message(&mut tx, br#"{"ping":true}"#, None).await.unwrap();

        let raw = read_message_raw(&mut rx).await.unwrap();
        assert_eq!(raw.json_message, r#"{"ping":true}"#);
        assert!(raw.data.is_empty());
    }
}
