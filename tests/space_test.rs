//! End-to-end tablespace tests over a synthetic on-disk B+Tree.
//!
//! Builds a 10,000-row compact-format clustered index (20 leaf pages of
//! 500 records under one root) in a temp file, then exercises space
//! iteration, extent mapping, cursors, and both search strategies.

use byteorder::{BigEndian, ByteOrder};
use std::io::Write;
use tempfile::NamedTempFile;

use ibd::innodb::btree::{CursorDirection, CursorPosition, Stats, STAT_COMPARE_KEY};
use ibd::innodb::data_types::{encode_int, Value};
use ibd::innodb::describer::RecordDescriber;
use ibd::innodb::fsp::{XDES_ARRAY_OFFSET, XDES_ENTRY_SIZE};
use ibd::innodb::list::{self, ListBase, NodeAddress};
use ibd::innodb::page::{TypedPage, UINT32_UNDEFINED};
use ibd::innodb::page_types::PageType;
use ibd::innodb::space::Space;

const PS: usize = 16384;
const FIL_NULL: u32 = UINT32_UNDEFINED;

const ROWS: i64 = 10_000;
const ROWS_PER_LEAF: i64 = 500;
const N_LEAVES: i64 = ROWS / ROWS_PER_LEAF;
const ROOT_PAGE: u32 = 3;
const FIRST_LEAF: u32 = 4;
const TOTAL_PAGES: u32 = FIRST_LEAF + N_LEAVES as u32;

const INDEX_ID: u64 = 42;
const HEAP_START: usize = 120; // after the supremum text
const INFIMUM: usize = 99;
const SUPREMUM: usize = 112;

fn describer() -> RecordDescriber {
    RecordDescriber::clustered()
        .key("id", "INT", &["NOT_NULL"])
        .unwrap()
        .row("value", "INT", &["NOT_NULL"])
        .unwrap()
}

fn fil_header(buf: &mut [u8], number: u32, page_type: u16, prev: u32, next: u32) {
    BigEndian::write_u32(&mut buf[4..], number);
    BigEndian::write_u32(&mut buf[8..], prev);
    BigEndian::write_u32(&mut buf[12..], next);
    BigEndian::write_u64(&mut buf[16..], 10_000);
    BigEndian::write_u16(&mut buf[24..], page_type);
    BigEndian::write_u32(&mut buf[34..], 0);
}

fn stamp_checksum(buf: &mut [u8]) {
    BigEndian::write_u32(&mut buf[PS - 4..], 10_000);
    let crc = {
        let crc1 = crc32c::crc32c(&buf[4..26]);
        let crc2 = crc32c::crc32c(&buf[38..PS - 8]);
        crc1 ^ crc2
    };
    BigEndian::write_u32(&mut buf[0..4], crc);
}

/// Write one compact record and its header. `record_size` is the byte
/// span from one origin to the next.
struct RecordSpec {
    origin: usize,
    heap_number: u16,
    n_owned: u8,
    min_rec: bool,
    next_origin: usize, // 0 = links to supremum
}

fn write_record_header(buf: &mut [u8], spec: &RecordSpec, record_type: u8) {
    buf[spec.origin - 5] =
        (spec.n_owned & 0x0F) | if spec.min_rec { 0x10 } else { 0 };
    BigEndian::write_u16(
        &mut buf[spec.origin - 4..],
        (spec.heap_number << 3) | u16::from(record_type),
    );
    let next = if spec.next_origin == 0 {
        SUPREMUM
    } else {
        spec.next_origin
    };
    BigEndian::write_i16(
        &mut buf[spec.origin - 2..],
        (next as i64 - spec.origin as i64) as i16,
    );
}

fn write_system_records(buf: &mut [u8], first_origin: usize, supremum_n_owned: u8) {
    // Infimum: heap 0, owns itself.
    buf[INFIMUM - 5] = 0x01;
    BigEndian::write_u16(&mut buf[INFIMUM - 4..], 2);
    BigEndian::write_i16(
        &mut buf[INFIMUM - 2..],
        (first_origin as i64 - INFIMUM as i64) as i16,
    );
    buf[INFIMUM..INFIMUM + 8].copy_from_slice(b"infimum\0");
    // Supremum: heap 1, chain end.
    buf[SUPREMUM - 5] = supremum_n_owned & 0x0F;
    BigEndian::write_u16(&mut buf[SUPREMUM - 4..], (1 << 3) | 3);
    BigEndian::write_i16(&mut buf[SUPREMUM - 2..], 0);
    buf[SUPREMUM..SUPREMUM + 8].copy_from_slice(b"supremum");
}

fn write_index_header(
    buf: &mut [u8],
    n_dir_slots: u16,
    heap_top: u16,
    n_records: u16,
    level: u16,
) {
    let d = 38;
    BigEndian::write_u16(&mut buf[d..], n_dir_slots);
    BigEndian::write_u16(&mut buf[d + 2..], heap_top);
    BigEndian::write_u16(&mut buf[d + 4..], 0x8000 | (n_records + 2));
    BigEndian::write_u16(&mut buf[d + 12..], 5); // no direction
    BigEndian::write_u16(&mut buf[d + 16..], n_records);
    BigEndian::write_u16(&mut buf[d + 26..], level);
    BigEndian::write_u64(&mut buf[d + 28..], INDEX_ID);
}

/// Page directory: slot 0 is infimum, then one slot per 4-record group
/// leader, then supremum.
fn write_directory(buf: &mut [u8], leaders: &[usize]) {
    let mut slots = vec![INFIMUM];
    slots.extend_from_slice(leaders);
    slots.push(SUPREMUM);
    for (k, origin) in slots.iter().enumerate() {
        let at = PS - 8 - (k + 1) * 2;
        BigEndian::write_u16(&mut buf[at..], *origin as u16);
    }
    write_index_header_slots(buf, slots.len() as u16);
}

fn write_index_header_slots(buf: &mut [u8], n_dir_slots: u16) {
    BigEndian::write_u16(&mut buf[38..], n_dir_slots);
}

/// Build one leaf page holding keys `first..=first + count - 1`.
fn build_leaf(page_number: u32, prev: u32, next: u32, first_key: i64, count: i64) -> Vec<u8> {
    const RECORD_SIZE: usize = 5 + 4 + 6 + 7 + 4; // header, key, trx, roll, row
    let mut buf = vec![0u8; PS];
    fil_header(&mut buf, page_number, 17855, prev, next);

    let origin_of = |i: i64| HEAP_START + i as usize * RECORD_SIZE + 5;
    let mut leaders = Vec::new();

    for i in 0..count {
        let origin = origin_of(i);
        let is_leader = i % 4 == 3;
        write_record_header(
            &mut buf,
            &RecordSpec {
                origin,
                heap_number: (i + 2) as u16,
                n_owned: if is_leader { 4 } else { 0 },
                min_rec: false,
                next_origin: if i + 1 < count { origin_of(i + 1) } else { 0 },
            },
            0,
        );
        if is_leader {
            leaders.push(origin);
        }
        let key = first_key + i;
        buf[origin..origin + 4].copy_from_slice(&encode_int(key, 4, false));
        // trx id and roll pointer stay zero; the row field mirrors the key.
        buf[origin + 4 + 13..origin + 4 + 13 + 4]
            .copy_from_slice(&encode_int(key * 2, 4, false));
    }

    let remainder = (count % 4) as u8;
    write_system_records(&mut buf, origin_of(0), remainder + 1);
    let heap_top = (HEAP_START + count as usize * RECORD_SIZE) as u16;
    write_index_header(&mut buf, 0, heap_top, count as u16, 0);
    write_directory(&mut buf, &leaders);
    stamp_checksum(&mut buf);
    buf
}

/// Build the root (level 1) page with one node pointer per leaf.
fn build_root() -> Vec<u8> {
    const RECORD_SIZE: usize = 5 + 4 + 4; // header, key, child
    let mut buf = vec![0u8; PS];
    fil_header(&mut buf, ROOT_PAGE, 17855, FIL_NULL, FIL_NULL);

    let origin_of = |i: i64| HEAP_START + i as usize * RECORD_SIZE + 5;
    let mut leaders = Vec::new();

    for i in 0..N_LEAVES {
        let origin = origin_of(i);
        let is_leader = i % 4 == 3;
        write_record_header(
            &mut buf,
            &RecordSpec {
                origin,
                heap_number: (i + 2) as u16,
                n_owned: if is_leader { 4 } else { 0 },
                min_rec: i == 0,
                next_origin: if i + 1 < N_LEAVES { origin_of(i + 1) } else { 0 },
            },
            1, // node pointer
        );
        if is_leader {
            leaders.push(origin);
        }
        let key = i * ROWS_PER_LEAF + 1;
        buf[origin..origin + 4].copy_from_slice(&encode_int(key, 4, false));
        BigEndian::write_u32(&mut buf[origin + 4..], FIRST_LEAF + i as u32);
    }

    let remainder = (N_LEAVES % 4) as u8;
    write_system_records(&mut buf, origin_of(0), remainder + 1);
    let heap_top = (HEAP_START + N_LEAVES as usize * RECORD_SIZE) as u16;
    write_index_header(&mut buf, 0, heap_top, N_LEAVES as u16, 1);
    write_directory(&mut buf, &leaders);
    stamp_checksum(&mut buf);
    buf
}

fn build_fsp_page() -> Vec<u8> {
    let mut buf = vec![0u8; PS];
    fil_header(&mut buf, 0, 8, FIL_NULL, FIL_NULL);
    let base = 38;
    BigEndian::write_u32(&mut buf[base..], 0); // space id
    BigEndian::write_u32(&mut buf[base + 8..], TOTAL_PAGES);
    BigEndian::write_u32(&mut buf[base + 12..], 64);
    // All list bases empty with absent ends.
    for list in [24usize, 40, 56, 80, 96] {
        BigEndian::write_u32(&mut buf[base + list + 4..], FIL_NULL);
        BigEndian::write_u32(&mut buf[base + list + 10..], FIL_NULL);
    }
    // XDES entry 0 covers the whole fixture.
    let entry = XDES_ARRAY_OFFSET;
    BigEndian::write_u32(&mut buf[entry + 8..], FIL_NULL);
    BigEndian::write_u32(&mut buf[entry + 14..], FIL_NULL);
    BigEndian::write_u32(&mut buf[entry + 20..], 2); // FREE_FRAG
    stamp_checksum(&mut buf);
    buf
}

fn build_filler(page_number: u32, page_type: u16) -> Vec<u8> {
    let mut buf = vec![0u8; PS];
    fil_header(&mut buf, page_number, page_type, FIL_NULL, FIL_NULL);
    stamp_checksum(&mut buf);
    buf
}

fn build_space() -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&build_fsp_page()).unwrap();
    tmp.write_all(&build_filler(1, 5)).unwrap(); // ibuf bitmap
    tmp.write_all(&build_filler(2, 3)).unwrap(); // inode
    tmp.write_all(&build_root()).unwrap();
    for i in 0..N_LEAVES {
        let page_number = FIRST_LEAF + i as u32;
        let prev = if i == 0 { FIL_NULL } else { page_number - 1 };
        let next = if i == N_LEAVES - 1 {
            FIL_NULL
        } else {
            page_number + 1
        };
        tmp.write_all(&build_leaf(page_number, prev, next, i * ROWS_PER_LEAF + 1, ROWS_PER_LEAF))
            .unwrap();
    }
    tmp.flush().unwrap();
    tmp
}

#[test]
fn space_geometry_and_page_dispatch() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();

    assert_eq!(space.page_size(), PS);
    assert_eq!(space.pages(), TOTAL_PAGES);
    assert_eq!(space.size(), TOTAL_PAGES as u64 * PS as u64);
    assert!(space.is_system_space());

    let page0 = space.page(0).unwrap().unwrap();
    assert_eq!(page0.page_type(), PageType::FspHdr);
    assert!(matches!(page0.typed(), TypedPage::FspHdr(_)));

    let root = space.page(ROOT_PAGE).unwrap().unwrap();
    assert_eq!(root.page_type(), PageType::Index);
}

#[test]
fn every_page_is_where_its_header_claims() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    for entry in space.each_page() {
        let (n, page) = entry.unwrap();
        assert_eq!(page.offset(), n);
        assert!(!page.misplaced());
        assert!(!page.checksum_result().corrupt(), "page {n} checksum");
    }
}

#[test]
fn page_type_regions_compress_runs() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    let regions = space.page_type_regions().unwrap();
    // FSP, IBUF_BITMAP, INODE, then one INDEX run covering root + leaves.
    assert_eq!(regions.len(), 4);
    assert_eq!(regions[3].page_type, PageType::Index);
    assert_eq!(regions[3].start, ROOT_PAGE);
    assert_eq!(regions[3].end, TOTAL_PAGES - 1);
    assert_eq!(regions[3].count, TOTAL_PAGES - ROOT_PAGE);
}

#[test]
fn xdes_covers_extents_by_64() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    for n in [0u32, 1, 13, 23] {
        let entry = space.xdes_for_page(n).unwrap();
        assert_eq!(entry.start_page, (n / 64) * 64);
        assert_eq!(entry.end_page(), entry.start_page + 63);
    }
}

#[test]
fn sibling_chain_is_well_formed() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();

    // Walk the leaf level left to right; prev/next must agree and both
    // ends terminate in the undefined sentinel.
    let mut seen = Vec::new();
    let mut current = Some(FIRST_LEAF);
    let mut previous: Option<u32> = None;
    while let Some(n) = current {
        let page = space.page(n).unwrap().unwrap();
        assert_eq!(page.prev(), previous, "prev of page {n}");
        seen.push(n);
        previous = Some(n);
        current = page.next();
    }
    assert_eq!(seen.len(), N_LEAVES as usize);
    assert_eq!(*seen.last().unwrap(), TOTAL_PAGES - 1);
}

#[test]
fn min_and_max_records() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    let index = space.index(ROOT_PAGE, describer());

    let min = index.min_record().unwrap().unwrap();
    assert_eq!(min.key[0].value, Value::Int(1));
    assert_eq!(min.page_number, FIRST_LEAF);

    let max = index.max_record().unwrap().unwrap();
    assert_eq!(max.key[0].value, Value::Int(ROWS));
    assert_eq!(max.page_number, TOTAL_PAGES - 1);

    assert_eq!(index.min_page_at_level(1).unwrap().number(), ROOT_PAGE);
    assert_eq!(index.min_page_at_level(0).unwrap().number(), FIRST_LEAF);
    assert_eq!(
        index.max_page_at_level(0).unwrap().number(),
        TOTAL_PAGES - 1
    );
}

#[test]
fn forward_cursor_is_strictly_increasing_and_crosses_pages() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    let index = space.index(ROOT_PAGE, describer());

    let mut cursor = index
        .cursor(CursorPosition::Min, CursorDirection::Forward)
        .unwrap();
    let first = cursor.record().unwrap().unwrap();
    let first_page = first.page_number;
    let mut last_key = match first.key[0].value {
        Value::Int(v) => v,
        ref other => panic!("unexpected key {other:?}"),
    };

    let mut current_page = first_page;
    for _ in 0..900 {
        let record = cursor.record().unwrap().unwrap();
        let key = match record.key[0].value {
            Value::Int(v) => v,
            ref other => panic!("unexpected key {other:?}"),
        };
        assert!(key > last_key, "cursor went backwards at {key}");
        last_key = key;
        current_page = record.page_number;
    }
    assert_ne!(current_page, first_page, "cursor never crossed a page");
}

#[test]
fn full_scan_sees_every_row_and_backward_reverses_it() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    let index = space.index(ROOT_PAGE, describer());

    let mut forward = Vec::new();
    let mut cursor = index
        .cursor(CursorPosition::Min, CursorDirection::Forward)
        .unwrap();
    while let Some(record) = cursor.record().unwrap() {
        match record.key[0].value {
            Value::Int(v) => forward.push(v),
            ref other => panic!("unexpected key {other:?}"),
        }
    }
    assert_eq!(forward.len(), ROWS as usize);
    assert_eq!(forward[0], 1);
    assert_eq!(*forward.last().unwrap(), ROWS);

    let mut backward = Vec::new();
    let mut cursor = index
        .cursor(CursorPosition::Max, CursorDirection::Backward)
        .unwrap();
    while let Some(record) = cursor.record().unwrap() {
        match record.key[0].value {
            Value::Int(v) => backward.push(v),
            ref other => panic!("unexpected key {other:?}"),
        }
    }
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn searches_agree_and_find_rows() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    let index = space.index(ROOT_PAGE, describer());
    let mut stats = Stats::new();

    for key in [1i64, 2, 499, 500, 501, 5_000, 9_999, ROWS] {
        let linear = index
            .linear_search(&[Value::Int(key)], &mut stats)
            .unwrap()
            .unwrap_or_else(|| panic!("linear_search missed {key}"));
        let binary = index
            .binary_search(&[Value::Int(key)], &mut stats)
            .unwrap()
            .unwrap_or_else(|| panic!("binary_search missed {key}"));
        assert_eq!(linear.key[0].value, Value::Int(key));
        assert_eq!(binary.key[0].value, Value::Int(key));
        assert_eq!(linear.offset, binary.offset);
        assert_eq!(linear.page_number, binary.page_number);
        // The row field is decoded through the describer as well.
        assert_eq!(linear.row[0].value, Value::Int(key * 2));
    }

    for missing in [0i64, -5, 999_999] {
        let mut stats = Stats::new();
        assert!(index
            .linear_search(&[Value::Int(missing)], &mut stats)
            .unwrap()
            .is_none());
        assert!(index
            .binary_search(&[Value::Int(missing)], &mut stats)
            .unwrap()
            .is_none());
    }
}

#[test]
fn binary_search_is_an_order_of_magnitude_cheaper() {
    let tmp = build_space();
    let space = Space::open(tmp.path()).unwrap();
    let index = space.index(ROOT_PAGE, describer());

    let mut linear_stats = Stats::new();
    index
        .linear_search(&[Value::Int(5_000)], &mut linear_stats)
        .unwrap()
        .unwrap();
    let linear_compares = linear_stats.get(STAT_COMPARE_KEY);

    let mut binary_stats = Stats::new();
    index
        .binary_search(&[Value::Int(5_000)], &mut binary_stats)
        .unwrap()
        .unwrap();
    let binary_compares = binary_stats.get(STAT_COMPARE_KEY);

    assert!(
        linear_compares >= 10 * binary_compares,
        "linear {linear_compares} vs binary {binary_compares}"
    );
}

#[test]
fn list_walker_matches_base_length_both_ways() {
    // A standalone two-extent FREE list threaded through page 0's XDES
    // entries 2 and 3.
    let mut buf = build_fsp_page();
    let offset_of = |i: usize| XDES_ARRAY_OFFSET + i * XDES_ENTRY_SIZE;
    let node_of = |i: usize| (offset_of(i) + 8) as u16;

    for (i, prev, next) in [(2usize, FIL_NULL, 3u32), (3, 2, FIL_NULL)] {
        let entry = offset_of(i);
        BigEndian::write_u64(&mut buf[entry..], 0);
        if prev == FIL_NULL {
            BigEndian::write_u32(&mut buf[entry + 8..], FIL_NULL);
        } else {
            BigEndian::write_u32(&mut buf[entry + 8..], 0);
            BigEndian::write_u16(&mut buf[entry + 12..], node_of(prev as usize));
        }
        if next == FIL_NULL {
            BigEndian::write_u32(&mut buf[entry + 14..], FIL_NULL);
        } else {
            BigEndian::write_u32(&mut buf[entry + 14..], 0);
            BigEndian::write_u16(&mut buf[entry + 18..], node_of(next as usize));
        }
        BigEndian::write_u32(&mut buf[entry + 20..], 1); // FREE
    }
    stamp_checksum(&mut buf);

    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&buf).unwrap();
    tmp.flush().unwrap();
    let space = Space::open(tmp.path()).unwrap();

    let base = ListBase {
        length: 2,
        first: Some(NodeAddress { page: 0, offset: node_of(2) }),
        last: Some(NodeAddress { page: 0, offset: node_of(3) }),
    };
    let decode = |page: &ibd::innodb::page::Page, offset: u16| {
        let position = (offset as usize - 8 - XDES_ARRAY_OFFSET) / XDES_ENTRY_SIZE;
        let TypedPage::FspHdr(fsp) = page.typed() else {
            panic!("node on a non-XDES page");
        };
        let entry = fsp.xdes_entry(position)?;
        let node = entry.list_node;
        Ok((entry, node))
    };

    let forward = list::walk_forward(&space, &base, decode).unwrap();
    assert_eq!(
        forward.iter().map(|e| e.position).collect::<Vec<_>>(),
        vec![2, 3]
    );

    let backward = list::walk_backward(&space, &base, decode).unwrap();
    assert_eq!(
        backward.iter().map(|e| e.position).collect::<Vec<_>>(),
        vec![3, 2]
    );

    // A base that overstates its length is a corruption.
    let bad = ListBase { length: 3, ..base };
    assert!(matches!(
        list::walk_forward(&space, &bad, decode),
        Err(ibd::IbdError::ListLengthMismatch(_))
    ));
}
