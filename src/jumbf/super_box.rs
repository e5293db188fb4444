//! Super box (`jumb`): a description box plus child boxes

use crate::error::{Error, Result};

use super::{read_box_header, write_box_header, BoxType, DataBox, DescriptionBox};

/// A single child of a super box
#[derive(Debug, Clone, PartialEq)]
pub enum ChildBox {
    /// A nested super box
    SuperBox(SuperBox),
    /// Any content box
    Data(DataBox),
}

impl ChildBox {
    /// Total serialized size including header
    pub fn measure(&self) -> u64 {
        match self {
            Self::SuperBox(sbox) => sbox.measure(),
            Self::Data(dbox) => dbox.measure(),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::SuperBox(sbox) => sbox.write(out),
            Self::Data(dbox) => dbox.write(out),
        }
    }

    /// The nested super box, if that is what this child is
    pub fn as_super_box(&self) -> Option<&SuperBox> {
        match self {
            Self::SuperBox(sbox) => Some(sbox),
            _ => None,
        }
    }

    /// The content box, if that is what this child is
    pub fn as_data_box(&self) -> Option<&DataBox> {
        match self {
            Self::Data(dbox) => Some(dbox),
            _ => None,
        }
    }
}

/// A JUMBF super box: a mandatory description box followed by zero or more
/// child boxes, any of which may themselves be super boxes.
///
/// A parsed super box remembers its original byte image and replays it on
/// write; call [`regenerate`](SuperBox::regenerate) after mutating the tree
/// so the next write re-encodes from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SuperBox {
    /// Description box
    pub desc: DescriptionBox,
    /// Child boxes in file order
    pub children: Vec<ChildBox>,
    original: Option<Vec<u8>>,
}

impl SuperBox {
    /// Create an empty super box with a labeled description
    pub fn new(uuid: [u8; 16], label: impl Into<String>) -> Self {
        Self {
            desc: DescriptionBox::new(uuid, label),
            children: Vec::new(),
            original: None,
        }
    }

    /// Create a super box from an existing description
    pub fn with_desc(desc: DescriptionBox) -> Self {
        Self {
            desc,
            children: Vec::new(),
            original: None,
        }
    }

    /// Append a content box child
    pub fn add_data(&mut self, dbox: DataBox) {
        self.original = None;
        self.children.push(ChildBox::Data(dbox));
    }

    /// Append a nested super box child
    pub fn add_super(&mut self, sbox: SuperBox) {
        self.original = None;
        self.children.push(ChildBox::SuperBox(sbox));
    }

    /// Parse a super box occupying the whole slice
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let (sbox, consumed) = Self::parse_at(data, 0)?;
        if consumed != data.len() as u64 {
            return Err(Error::MalformedBox {
                offset: consumed,
                reason: format!("{} trailing bytes after super box", data.len() as u64 - consumed),
            });
        }
        Ok(sbox)
    }

    /// Parse a super box from `data` at `offset`.
    ///
    /// `data` must end where the enclosing parent ends, since an LBox of 0
    /// means "extends to end of parent". Returns the box and the bytes
    /// consumed.
    pub fn parse_at(data: &[u8], offset: u64) -> Result<(Self, u64)> {
        let header = read_box_header(data, offset)?;
        if header.box_type != BoxType::JUMB {
            return Err(Error::UnexpectedBoxType {
                expected: BoxType::JUMB.to_string(),
                found: header.box_type.to_string(),
            });
        }

        let end = offset + header.size;
        let bounded = &data[..end as usize];
        let mut pos = offset + header.header_len;

        let (desc, desc_len) = DescriptionBox::parse(bounded, pos)?;
        pos += desc_len;

        let mut children = Vec::new();
        while pos < end {
            let child_header = read_box_header(bounded, pos)?;
            let (child, consumed) = if child_header.box_type == BoxType::JUMB {
                let (sbox, consumed) = Self::parse_at(bounded, pos)?;
                (ChildBox::SuperBox(sbox), consumed)
            } else {
                let (dbox, consumed) =
                    DataBox::parse_with_header(bounded, pos, child_header)?;
                (ChildBox::Data(dbox), consumed)
            };
            children.push(child);
            pos += consumed;
        }

        if pos != end {
            return Err(Error::MalformedBox {
                offset,
                reason: format!("children consumed {} bytes past declared size", pos - end),
            });
        }

        Ok((
            Self {
                desc,
                children,
                original: Some(data[offset as usize..end as usize].to_vec()),
            },
            header.size,
        ))
    }

    /// Label from the description box, if any
    pub fn label(&self) -> Option<&str> {
        self.desc.label.as_deref()
    }

    /// Find a requestable child super box by label.
    ///
    /// A label containing `/` is treated as a hierarchical path. Returns
    /// `None` when no child matches or when the label is ambiguous within
    /// its parent.
    pub fn find_by_label(&self, label: &str) -> Option<&SuperBox> {
        let (head, suffix) = match label.split_once('/') {
            Some((head, suffix)) => (head, Some(suffix)),
            None => (label, None),
        };

        let matching: Vec<&SuperBox> = self
            .children
            .iter()
            .filter_map(|child| child.as_super_box())
            .filter(|sbox| sbox.desc.requestable && sbox.label() == Some(head))
            .collect();

        match (matching.as_slice(), suffix) {
            ([sbox], Some(suffix)) => sbox.find_by_label(suffix),
            ([sbox], None) => Some(sbox),
            _ => None,
        }
    }

    /// If the first child is a content box, return it
    pub fn data_box(&self) -> Option<&DataBox> {
        self.children.first().and_then(|child| child.as_data_box())
    }

    /// Child super boxes in file order
    pub fn super_boxes(&self) -> impl Iterator<Item = &SuperBox> {
        self.children.iter().filter_map(|child| child.as_super_box())
    }

    /// The exact bytes this box was parsed from, if unmodified
    pub fn original(&self) -> Option<&[u8]> {
        self.original.as_deref()
    }

    /// Drop the remembered byte image, recursively, so the next write
    /// re-encodes from the model
    pub fn regenerate(&mut self) {
        self.original = None;
        for child in &mut self.children {
            if let ChildBox::SuperBox(sbox) = child {
                sbox.regenerate();
            }
        }
    }

    fn payload_len(&self) -> u64 {
        self.desc.measure() + self.children.iter().map(|c| c.measure()).sum::<u64>()
    }

    /// Total serialized size including the box header
    pub fn measure(&self) -> u64 {
        if let Some(original) = &self.original {
            return original.len() as u64;
        }
        let payload = self.payload_len();
        super::header_len_for(payload) + payload
    }

    /// Serialize into `out`, replaying the original image when present
    pub fn write(&self, out: &mut Vec<u8>) {
        if let Some(original) = &self.original {
            out.extend_from_slice(original);
            return;
        }
        write_box_header(out, BoxType::JUMB, self.payload_len());
        self.desc.write(out);
        for child in &self.children {
            child.write(out);
        }
    }

    /// Serialize to a fresh buffer
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.measure() as usize);
        self.write(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jumbf::{CborBox, CBOR_CONTENT_UUID, MANIFEST_STORE_UUID, MANIFEST_UUID};

    fn sample_tree() -> SuperBox {
        let mut store = SuperBox::new(MANIFEST_STORE_UUID, "c2pa");
        let mut manifest = SuperBox::new(MANIFEST_UUID, "urn:uuid:sample");
        let mut claim = SuperBox::new(CBOR_CONTENT_UUID, "c2pa.claim");
        claim.add_data(DataBox::Cbor(CborBox::new(ciborium::Value::Text(
            "claim".into(),
        ))));
        manifest.add_super(claim);
        store.add_super(manifest);
        store
    }

    #[test]
    fn test_synthesized_round_trip() {
        let tree = sample_tree();
        let bytes = tree.serialize();
        assert_eq!(bytes.len() as u64, tree.measure());

        let parsed = SuperBox::from_slice(&bytes).unwrap();
        assert_eq!(parsed.label(), Some("c2pa"));
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn test_parsed_box_replays_original_bytes() {
        let bytes = sample_tree().serialize();
        let parsed = SuperBox::from_slice(&bytes).unwrap();
        assert_eq!(parsed.original(), Some(bytes.as_slice()));

        // Nested boxes keep their own images too
        let manifest = parsed.find_by_label("urn:uuid:sample").unwrap();
        assert!(manifest.original().is_some());
    }

    #[test]
    fn test_regenerate_reencodes_identically_when_unchanged() {
        let bytes = sample_tree().serialize();
        let mut parsed = SuperBox::from_slice(&bytes).unwrap();
        parsed.regenerate();
        assert!(parsed.original().is_none());
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn test_find_by_label_hierarchical() {
        let tree = sample_tree();
        let claim = tree.find_by_label("urn:uuid:sample/c2pa.claim").unwrap();
        assert!(matches!(claim.data_box(), Some(DataBox::Cbor(_))));
        assert!(tree.find_by_label("urn:uuid:sample/missing").is_none());
    }

    #[test]
    fn test_duplicate_labels_are_ambiguous() {
        let mut store = SuperBox::new(MANIFEST_STORE_UUID, "c2pa");
        store.add_super(SuperBox::new(MANIFEST_UUID, "dup"));
        store.add_super(SuperBox::new(MANIFEST_UUID, "dup"));
        assert!(store.find_by_label("dup").is_none());
    }

    #[test]
    fn test_declared_length_mismatch_is_fatal() {
        let mut bytes = sample_tree().serialize();
        // Shrink the outer declared size by one; the last child now reads
        // past the parent end
        let total = bytes.len() as u32 - 1;
        bytes[..4].copy_from_slice(&total.to_be_bytes());
        assert!(SuperBox::from_slice(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_non_jumb_root_rejected() {
        let bytes = DataBox::Cbor(CborBox::empty()).serialize();
        assert!(matches!(
            SuperBox::from_slice(&bytes),
            Err(Error::UnexpectedBoxType { .. })
        ));
    }
}
