//! On-page doubly-linked list bases, nodes, and the generic walker.
//!
//! InnoDB chains many structures through "file lists" (`flst` in the MySQL
//! source): extent descriptors hang off the FSP header's FREE/FREE_FRAG/
//! FULL_FRAG bases, inode pages off the SEG_INODES lists, and segment
//! extents off the per-inode FREE/NOT_FULL/FULL bases. A list base is
//! `(length, first, last)`; each node stores `(prev, next)`; an address is
//! `(page_number, byte_offset)` with `UINT32_MAX` meaning absent.
//!
//! [`walk_forward`] and [`walk_backward`] traverse a list through a space,
//! decoding each element with a caller-supplied callback. A walked count
//! that disagrees with the base length is reported as
//! [`IbdError::ListLengthMismatch`].

use serde::Serialize;

use crate::innodb::cursor::Cursor;
use crate::innodb::page::{page_number_or_none, Page};
use crate::innodb::space::Space;
use crate::IbdError;

/// Size of a node address on disk: page number (4) + byte offset (2).
pub const ADDRESS_SIZE: usize = 6;
/// Size of a list base node: length (4) + first (6) + last (6).
pub const BASE_NODE_SIZE: usize = 16;
/// Size of a list node: prev (6) + next (6).
pub const NODE_SIZE: usize = 12;

/// Location of a list node: a page number and a byte offset within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeAddress {
    pub page: u32,
    pub offset: u16,
}

/// Read an optional node address (absent when the page is `UINT32_MAX`).
pub fn read_address(c: &mut Cursor<'_>) -> Result<Option<NodeAddress>, IbdError> {
    let page = c.read_u32()?;
    let offset = c.read_u16()?;
    Ok(page_number_or_none(page).map(|page| NodeAddress { page, offset }))
}

/// A list base: the anchor holding the length and both end addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListBase {
    /// Number of nodes on the list.
    pub length: u32,
    /// First node, or None for an empty list.
    pub first: Option<NodeAddress>,
    /// Last node, or None for an empty list.
    pub last: Option<NodeAddress>,
}

impl ListBase {
    /// Read a base node at the cursor position.
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, IbdError> {
        c.name("list_base", |c| {
            Ok(ListBase {
                length: c.read_u32()?,
                first: read_address(c)?,
                last: read_address(c)?,
            })
        })
    }

    /// True when the list holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// A list node: the prev/next links embedded in a listed structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListNode {
    pub prev: Option<NodeAddress>,
    pub next: Option<NodeAddress>,
}

impl ListNode {
    /// Read a node at the cursor position.
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, IbdError> {
        c.name("list_node", |c| {
            Ok(ListNode {
                prev: read_address(c)?,
                next: read_address(c)?,
            })
        })
    }
}

/// Walk a list from `first` to `last`, decoding each element.
///
/// The callback receives the page holding the node and the node's byte
/// offset, and returns the decoded element together with its links so the
/// walk can continue.
pub fn walk_forward<T>(
    space: &Space,
    base: &ListBase,
    mut decode: impl FnMut(&Page, u16) -> Result<(T, ListNode), IbdError>,
) -> Result<Vec<T>, IbdError> {
    walk(space, base, base.first, &mut decode, |node| node.next)
}

/// Walk a list from `last` to `first`.
pub fn walk_backward<T>(
    space: &Space,
    base: &ListBase,
    mut decode: impl FnMut(&Page, u16) -> Result<(T, ListNode), IbdError>,
) -> Result<Vec<T>, IbdError> {
    walk(space, base, base.last, &mut decode, |node| node.prev)
}

fn walk<T>(
    space: &Space,
    base: &ListBase,
    start: Option<NodeAddress>,
    decode: &mut impl FnMut(&Page, u16) -> Result<(T, ListNode), IbdError>,
    advance: impl Fn(&ListNode) -> Option<NodeAddress>,
) -> Result<Vec<T>, IbdError> {
    let mut out = Vec::with_capacity(base.length as usize);
    let mut current = start;

    while let Some(address) = current {
        if out.len() as u32 == base.length {
            return Err(IbdError::ListLengthMismatch(format!(
                "list base claims {} nodes but the chain continues at page {}",
                base.length, address.page
            )));
        }
        let page = space.page(address.page)?.ok_or_else(|| {
            IbdError::ListLengthMismatch(format!(
                "list node points past the space at page {}",
                address.page
            ))
        })?;
        let (element, node) = decode(&page, address.offset)?;
        out.push(element);
        current = advance(&node);
    }

    if out.len() as u32 != base.length {
        return Err(IbdError::ListLengthMismatch(format!(
            "walked {} nodes, list base claims {}",
            out.len(),
            base.length
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    #[test]
    fn test_read_base_and_node() {
        let mut data = vec![0u8; BASE_NODE_SIZE + NODE_SIZE];
        BigEndian::write_u32(&mut data[0..], 2); // length
        BigEndian::write_u32(&mut data[4..], 10); // first.page
        BigEndian::write_u16(&mut data[8..], 50); // first.offset
        BigEndian::write_u32(&mut data[10..], 0xFFFF_FFFF); // last absent
        BigEndian::write_u32(&mut data[16..], 0xFFFF_FFFF); // node.prev absent
        BigEndian::write_u32(&mut data[22..], 11); // node.next.page
        BigEndian::write_u16(&mut data[26..], 60); // node.next.offset

        let mut c = Cursor::new(&data);
        let base = ListBase::read(&mut c).unwrap();
        assert_eq!(base.length, 2);
        assert_eq!(base.first, Some(NodeAddress { page: 10, offset: 50 }));
        assert_eq!(base.last, None);
        assert!(!base.is_empty());

        let node = ListNode::read(&mut c).unwrap();
        assert_eq!(node.prev, None);
        assert_eq!(node.next, Some(NodeAddress { page: 11, offset: 60 }));
    }

    #[test]
    fn test_empty_base() {
        let mut data = vec![0u8; BASE_NODE_SIZE];
        BigEndian::write_u32(&mut data[4..], 0xFFFF_FFFF);
        BigEndian::write_u32(&mut data[10..], 0xFFFF_FFFF);
        let base = ListBase::read(&mut Cursor::new(&data)).unwrap();
        assert!(base.is_empty());
        assert_eq!(base.first, None);
    }
}
