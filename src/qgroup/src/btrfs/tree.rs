// Reads qgroup items out of the quota tree.
//
// item layouts (little-endian, on-disk):
//   info:     generation, rfer, rfer_cmpr, excl, excl_cmpr
//   limit:    flags, max_rfer, max_excl, rsv_rfer, rsv_excl
//   relation: no body; key (objectid, offset) = (member, parent), also stored reversed

use std::collections::BTreeMap;

use nix::errno::Errno;
use tracing::trace;

use super::ioctl::{
    BtrfsIoctlSearchArgs, BtrfsIoctlSearchKey, BTRFS_QGROUP_INFO_KEY, BTRFS_QGROUP_LIMIT_KEY,
    BTRFS_QGROUP_RELATION_KEY, BTRFS_QUOTA_TREE_OBJECTID, SEARCH_HEADER_SIZE,
};
use crate::{
    id::QgroupId,
    listing::QgroupRow,
    request::LimitFlags,
};

const SEARCH_NR_ITEMS: u32 = 4096;

fn ne_u64(b: &[u8], off: usize) -> u64 {
    let mut a = [0u8; 8];
    a.copy_from_slice(&b[off..off + 8]);
    u64::from_ne_bytes(a)
}

fn ne_u32(b: &[u8], off: usize) -> u32 {
    let mut a = [0u8; 4];
    a.copy_from_slice(&b[off..off + 4]);
    u32::from_ne_bytes(a)
}

fn le_u64(b: &[u8], off: usize) -> u64 {
    let mut a = [0u8; 8];
    a.copy_from_slice(&b[off..off + 8]);
    u64::from_le_bytes(a)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemKey {
    pub objectid: u64,
    pub type_: u32,
    pub offset: u64,
}

/// Accumulates quota tree items into rows.
#[derive(Default)]
pub struct QgroupCollector {
    rows: BTreeMap<QgroupId, QgroupRow>,
}

impl QgroupCollector {
    fn row(&mut self, id: QgroupId) -> &mut QgroupRow {
        self.rows.entry(id).or_insert_with(|| QgroupRow {
            qgroupid: id,
            ..Default::default()
        })
    }

    pub fn add_item(&mut self, key: ItemKey, data: &[u8]) -> Result<(), Errno> {
        match key.type_ {
            BTRFS_QGROUP_INFO_KEY => {
                if data.len() < 40 {
                    return Err(Errno::EUCLEAN);
                }
                let row = self.row(QgroupId::decode(key.offset));
                row.rfer = le_u64(data, 8);
                row.excl = le_u64(data, 24);
            }
            BTRFS_QGROUP_LIMIT_KEY => {
                if data.len() < 24 {
                    return Err(Errno::EUCLEAN);
                }
                let flags = LimitFlags::from_bits_truncate(le_u64(data, 0));
                let (max_rfer, max_excl) = (le_u64(data, 8), le_u64(data, 16));
                let row = self.row(QgroupId::decode(key.offset));
                row.max_rfer = (flags.contains(LimitFlags::MAX_RFER) && max_rfer != u64::MAX).then_some(max_rfer);
                row.max_excl = (flags.contains(LimitFlags::MAX_EXCL) && max_excl != u64::MAX).then_some(max_excl);
            }
            // each relation is stored twice; keep the member -> parent copy
            BTRFS_QGROUP_RELATION_KEY if key.objectid < key.offset => {
                let member = QgroupId::decode(key.objectid);
                let parent = QgroupId::decode(key.offset);
                self.row(member).parents.push(parent);
                self.row(parent).children.push(member);
            }
            _ => {}
        }
        Ok(())
    }

    /// Feeds every item in a search result buffer; returns the key of the last one.
    pub fn add_buffer(&mut self, buf: &[u8], nr_items: u32) -> Result<Option<ItemKey>, Errno> {
        let mut off = 0;
        let mut last = None;
        for _ in 0..nr_items {
            if off + SEARCH_HEADER_SIZE > buf.len() {
                return Err(Errno::EUCLEAN);
            }
            let key = ItemKey {
                objectid: ne_u64(buf, off + 8),
                offset: ne_u64(buf, off + 16),
                type_: ne_u32(buf, off + 24),
            };
            let len = ne_u32(buf, off + 28) as usize;
            off += SEARCH_HEADER_SIZE;
            if off + len > buf.len() {
                return Err(Errno::EUCLEAN);
            }

            self.add_item(key, &buf[off..off + len])?;
            off += len;
            last = Some(key);
        }
        Ok(last)
    }

    pub fn finish(self) -> Vec<QgroupRow> {
        self.rows
            .into_values()
            .map(|mut row| {
                row.parents.sort();
                row.parents.dedup();
                row.children.sort();
                row.children.dedup();
                row
            })
            .collect()
    }
}

pub fn search_key() -> BtrfsIoctlSearchKey {
    BtrfsIoctlSearchKey {
        tree_id: BTRFS_QUOTA_TREE_OBJECTID,
        max_objectid: u64::MAX,
        max_offset: u64::MAX,
        max_transid: u64::MAX,
        min_type: BTRFS_QGROUP_INFO_KEY,
        max_type: BTRFS_QGROUP_RELATION_KEY,
        nr_items: SEARCH_NR_ITEMS,
        ..Default::default()
    }
}

/// Moves the search start just past `last`. False once the key space is exhausted.
fn advance(key: &mut BtrfsIoctlSearchKey, last: ItemKey) -> bool {
    key.min_objectid = last.objectid;
    key.min_type = last.type_;
    key.min_offset = last.offset;

    if key.min_offset < u64::MAX {
        key.min_offset += 1;
    } else if key.min_type < u8::MAX as u32 {
        key.min_type += 1;
        key.min_offset = 0;
    } else if key.min_objectid < u64::MAX {
        key.min_objectid += 1;
        key.min_type = 0;
        key.min_offset = 0;
    } else {
        return false;
    }
    true
}

/// Loads all qgroups using `search` to run one TREE_SEARCH round.
pub fn load_qgroups(
    mut search: impl FnMut(&mut BtrfsIoctlSearchArgs) -> nix::Result<()>,
) -> nix::Result<Vec<QgroupRow>> {
    let mut collector = QgroupCollector::default();
    let mut args = Box::new(BtrfsIoctlSearchArgs::new(search_key()));

    loop {
        args.key.nr_items = SEARCH_NR_ITEMS;
        search(&mut *args)?;
        let nr_items = args.key.nr_items;
        trace!(nr_items, "tree search round");
        if nr_items == 0 {
            break;
        }

        let Some(last) = collector.add_buffer(&args.buf, nr_items)? else {
            break;
        };
        if !advance(&mut args.key, last) {
            break;
        }
    }

    Ok(collector.finish())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::btrfs::ioctl::SEARCH_BUF_SIZE;

    fn push_item(buf: &mut Vec<u8>, objectid: u64, type_: u32, offset: u64, data: &[u8]) {
        buf.extend_from_slice(&0u64.to_ne_bytes());
        buf.extend_from_slice(&objectid.to_ne_bytes());
        buf.extend_from_slice(&offset.to_ne_bytes());
        buf.extend_from_slice(&type_.to_ne_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_ne_bytes());
        buf.extend_from_slice(data);
    }

    fn le_words(words: &[u64]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn qg(level: u16, objectid: u64) -> QgroupId {
        QgroupId::new(level, objectid).unwrap()
    }

    #[test]
    fn collects_info_limit_and_relations() {
        let subvol = qg(0, 257).encode();
        let parent = qg(1, 100).encode();

        let mut buf = Vec::new();
        push_item(&mut buf, 0, BTRFS_QGROUP_INFO_KEY, subvol, &le_words(&[7, 4096, 4096, 1024, 1024]));
        push_item(&mut buf, 0, BTRFS_QGROUP_INFO_KEY, parent, &le_words(&[7, 8192, 8192, 2048, 2048]));
        push_item(&mut buf, 0, BTRFS_QGROUP_LIMIT_KEY, subvol, &le_words(&[1 | 16 | 32, 1 << 30, 0, 0, 0]));
        push_item(&mut buf, subvol, BTRFS_QGROUP_RELATION_KEY, parent, &[]);
        push_item(&mut buf, parent, BTRFS_QGROUP_RELATION_KEY, subvol, &[]);

        let mut c = QgroupCollector::default();
        let last = c.add_buffer(&buf, 5).unwrap().unwrap();
        assert_eq!(last.objectid, parent);
        let rows = c.finish();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].qgroupid, qg(0, 257));
        assert_eq!(rows[0].rfer, 4096);
        assert_eq!(rows[0].excl, 1024);
        assert_eq!(rows[0].max_rfer, Some(1 << 30));
        assert_eq!(rows[0].max_excl, None);
        assert_eq!(rows[0].parents, vec![qg(1, 100)]);
        assert_eq!(rows[1].children, vec![qg(0, 257)]);
        assert!(rows[1].parents.is_empty());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut buf = Vec::new();
        push_item(&mut buf, 0, BTRFS_QGROUP_INFO_KEY, 5, &le_words(&[1, 2, 3, 4, 5]));
        buf.truncate(buf.len() - 1);
        let mut c = QgroupCollector::default();
        assert_eq!(c.add_buffer(&buf, 1), Err(Errno::EUCLEAN));
    }

    #[test]
    fn load_pages_through_results() {
        let mut rounds = 0;
        let rows = load_qgroups(|args| {
            rounds += 1;
            let mut buf = Vec::new();
            match rounds {
                1 => {
                    assert_eq!(args.key.min_offset, 0);
                    push_item(&mut buf, 0, BTRFS_QGROUP_INFO_KEY, 5, &le_words(&[1, 10, 10, 10, 10]));
                    args.key.nr_items = 1;
                }
                2 => {
                    assert_eq!(args.key.min_offset, 6);
                    assert_eq!(args.key.min_type, BTRFS_QGROUP_INFO_KEY);
                    push_item(&mut buf, 0, BTRFS_QGROUP_INFO_KEY, 256, &le_words(&[1, 20, 20, 20, 20]));
                    args.key.nr_items = 1;
                }
                _ => args.key.nr_items = 0,
            }
            args.buf = [0; SEARCH_BUF_SIZE];
            args.buf[..buf.len()].copy_from_slice(&buf);
            Ok(())
        })
        .unwrap();

        assert_eq!(rounds, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].rfer, 20);
    }

    #[test]
    fn max_offset_moves_to_next_type() {
        let mut rounds = 0;
        let rows = load_qgroups(|args| {
            rounds += 1;
            let mut buf = Vec::new();
            match rounds {
                1 => {
                    push_item(&mut buf, 0, BTRFS_QGROUP_INFO_KEY, u64::MAX, &le_words(&[1, 1, 1, 1, 1]));
                    args.key.nr_items = 1;
                }
                2 => {
                    assert_eq!(args.key.min_objectid, 0);
                    assert_eq!(args.key.min_type, BTRFS_QGROUP_INFO_KEY + 1);
                    assert_eq!(args.key.min_offset, 0);
                    push_item(&mut buf, 0, BTRFS_QGROUP_LIMIT_KEY, 5, &le_words(&[1, 100, 0, 0, 0]));
                    args.key.nr_items = 1;
                }
                _ => args.key.nr_items = 0,
            }
            args.buf = [0; SEARCH_BUF_SIZE];
            args.buf[..buf.len()].copy_from_slice(&buf);
            Ok(())
        })
        .unwrap();

        assert_eq!(rounds, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].max_rfer, Some(100));
    }

    #[test]
    fn advance_carries_into_objectid() {
        let mut key = search_key();
        let last = ItemKey { objectid: 7, type_: u8::MAX as u32, offset: u64::MAX };
        assert!(advance(&mut key, last));
        assert_eq!((key.min_objectid, key.min_type, key.min_offset), (8, 0, 0));

        let last = ItemKey { objectid: u64::MAX, type_: u8::MAX as u32, offset: u64::MAX };
        assert!(!advance(&mut key, last));
    }

    #[test]
    fn search_errors_propagate() {
        assert_eq!(load_qgroups(|_| Err(Errno::ENOENT)), Err(Errno::ENOENT));
    }
}
