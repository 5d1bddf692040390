use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

use crate::error::OperationError;

/// Largest public key or extra field an operation may carry.
pub const MAX_FIELD_LEN: usize = 200;

/// A custody instruction as carried in a transaction memo.
///
/// Layout: `id (16) | type (1) | curve (1) | len (1) | public | len (1) | extra`.
/// The public key travels as lowercase hex in memory and as raw bytes on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: Uuid,
    pub kind: u8,
    pub curve: u8,
    pub public: String,
    pub extra: Vec<u8>,
}

impl Operation {
    pub fn encode(&self) -> Result<Vec<u8>, OperationError> {
        if self.public.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(OperationError::InvalidPublicKey(format!(
                "{} is not lowercase hex",
                self.public
            )));
        }
        let public = hex::decode(&self.public)
            .map_err(|e| OperationError::InvalidPublicKey(format!("{}: {e}", self.public)))?;
        check_len("public key", public.len())?;
        check_len("extra", self.extra.len())?;

        let mut out = Vec::with_capacity(16 + 4 + public.len() + self.extra.len());
        out.extend_from_slice(self.id.as_bytes());
        out.push(self.kind);
        out.push(self.curve);
        out.push(public.len() as u8);
        out.extend_from_slice(&public);
        out.push(self.extra.len() as u8);
        out.extend_from_slice(&self.extra);
        Ok(out)
    }

    /// Decode an operation. Bytes past the extra field are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, OperationError> {
        let mut reader = Reader::new(data);
        let id = reader.read_array::<16>("id")?;
        let kind = reader.read_u8("type")?;
        let curve = reader.read_u8("curve")?;
        let public = reader.read_var_bytes("public key")?;
        let extra = reader.read_var_bytes("extra")?;
        Ok(Operation {
            id: Uuid::from_bytes(id),
            kind,
            curve,
            public: hex::encode(public),
            extra: extra.to_vec(),
        })
    }

    pub fn encode_base64(&self) -> Result<String, OperationError> {
        Ok(URL_SAFE_NO_PAD.encode(self.encode()?))
    }

    pub fn decode_base64(memo: &str) -> Result<Self, OperationError> {
        let data = URL_SAFE_NO_PAD
            .decode(memo.trim_end_matches('='))
            .map_err(|e| OperationError::InvalidBase64(e.to_string()))?;
        Self::decode(&data)
    }
}

fn check_len(field: &'static str, len: usize) -> Result<(), OperationError> {
    if len > MAX_FIELD_LEN {
        return Err(OperationError::FieldTooLarge {
            field,
            len,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], OperationError> {
        let remaining = self.data.len() - self.pos;
        if n > remaining {
            return Err(OperationError::Truncated {
                field,
                needed: n,
                remaining,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, OperationError> {
        Ok(self.take(field, 1)?[0])
    }

    fn read_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], OperationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn read_var_bytes(&mut self, field: &'static str) -> Result<&'a [u8], OperationError> {
        let len = self.read_u8(field)? as usize;
        self.take(field, len)
    }
}
