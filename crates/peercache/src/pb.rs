//! Wire messages exchanged between peers (protobuf)

/// Lookup of `key` in the group named `group`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    /// Group name
    #[prost(string, tag = "1")]
    pub group: String,
    /// Key within the group
    #[prost(string, tag = "2")]
    pub key: String,
}

/// Value found by the owning peer
#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    /// Raw value bytes
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_response_decodes_from_wire() {
        // field 1, wire type 2 (length-delimited), length 3, "630"
        let wire = [0x0a, 0x03, b'6', b'3', b'0'];
        let resp = Response::decode(&wire[..]).unwrap();
        assert_eq!(resp.value, b"630");
    }

    #[test]
    fn test_truncated_response_is_an_error() {
        let wire = [0x0a, 0x05, b'6'];
        assert!(Response::decode(&wire[..]).is_err());
    }
}
