//! Builds small, well-formed archives in memory for tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use rzim::zim::Header;
use rzim::{DirEntry, EntryKind, MemoryReader, Namespace, ReadAt};

fn namespace(c: char) -> Namespace {
    Namespace::try_from(c).expect("ASCII namespace")
}

enum Item {
    Content {
        namespace: Namespace,
        url: String,
        title: String,
        mime: String,
        data: Vec<u8>,
        mime_override: Option<u16>,
    },
    Redirect {
        namespace: Namespace,
        url: String,
        title: String,
        target: (Namespace, String),
    },
}

impl Item {
    fn key(&self) -> (Namespace, &str) {
        match self {
            Item::Content { namespace, url, .. } | Item::Redirect { namespace, url, .. } => {
                (*namespace, url.as_str())
            }
        }
    }

    fn title_key(&self) -> (Namespace, &str, &str) {
        match self {
            Item::Content {
                namespace,
                url,
                title,
                ..
            }
            | Item::Redirect {
                namespace,
                url,
                title,
                ..
            } => {
                let shown = if title.is_empty() { url } else { title };
                (*namespace, shown.as_str(), url.as_str())
            }
        }
    }
}

pub struct ArchiveBuilder {
    items: Vec<Item>,
    cluster_info: u8,
    blobs_per_cluster: usize,
    main_page: Option<(Namespace, String)>,
    major_version: u16,
    minor_version: u16,
}

impl ArchiveBuilder {
    /// `cluster_info` is the raw info byte: compression in the low nibble,
    /// `0x10` for extended clusters.
    pub fn new(cluster_info: u8) -> Self {
        Self {
            items: Vec::new(),
            cluster_info,
            blobs_per_cluster: 3,
            main_page: None,
            major_version: 5,
            minor_version: 0,
        }
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn blobs_per_cluster(mut self, n: usize) -> Self {
        self.blobs_per_cluster = n.max(1);
        self
    }

    pub fn content(
        mut self,
        ns: char,
        url: &str,
        title: &str,
        mime: &str,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.items.push(Item::Content {
            namespace: namespace(ns),
            url: url.to_string(),
            title: title.to_string(),
            mime: mime.to_string(),
            data: data.into(),
            mime_override: None,
        });
        self
    }

    /// A content entry whose mimetype index points outside the table.
    pub fn content_with_bad_mime(mut self, ns: char, url: &str) -> Self {
        self.items.push(Item::Content {
            namespace: namespace(ns),
            url: url.to_string(),
            title: String::new(),
            mime: "text/plain".to_string(),
            data: b"x".to_vec(),
            mime_override: Some(999),
        });
        self
    }

    pub fn redirect(mut self, ns: char, url: &str, title: &str, target: &str) -> Self {
        let (tns, turl) = target.split_once('/').expect("target is ns/url");
        self.items.push(Item::Redirect {
            namespace: namespace(ns),
            url: url.to_string(),
            title: title.to_string(),
            target: (
                namespace(tns.chars().next().expect("namespace char")),
                turl.to_string(),
            ),
        });
        self
    }

    pub fn main_page(mut self, path: &str) -> Self {
        let (ns, url) = path.split_once('/').expect("path is ns/url");
        self.main_page = Some((
            namespace(ns.chars().next().expect("namespace char")),
            url.to_string(),
        ));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.items.sort_by(|a, b| a.key().cmp(&b.key()));

        let index_of: HashMap<(Namespace, String), u32> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let (ns, url) = item.key();
                ((ns, url.to_string()), i as u32)
            })
            .collect();

        let mut title_order: Vec<u32> = (0..self.items.len() as u32).collect();
        title_order.sort_by(|&a, &b| {
            self.items[a as usize]
                .title_key()
                .cmp(&self.items[b as usize].title_key())
        });

        // Mimetypes in first-seen order
        let mut mime_types: Vec<String> = Vec::new();
        for item in &self.items {
            if let Item::Content { mime, .. } = item {
                if !mime_types.contains(mime) {
                    mime_types.push(mime.clone());
                }
            }
        }

        // Group content blobs into clusters in URL order
        let mut clusters: Vec<Vec<Vec<u8>>> = Vec::new();
        let mut dirents = Vec::new();
        for (i, item) in self.items.iter().enumerate() {
            let (namespace, url, title, kind) = match item {
                Item::Content {
                    namespace,
                    url,
                    title,
                    mime,
                    data,
                    mime_override,
                } => {
                    if clusters
                        .last()
                        .is_none_or(|c| c.len() >= self.blobs_per_cluster)
                    {
                        clusters.push(Vec::new());
                    }
                    let cluster = clusters.len() - 1;
                    clusters[cluster].push(data.clone());
                    let mime_index = mime_override.unwrap_or_else(|| {
                        mime_types.iter().position(|m| m == mime).unwrap() as u16
                    });
                    (
                        *namespace,
                        url,
                        title,
                        EntryKind::Content {
                            mime_index,
                            cluster: cluster as u32,
                            blob: (clusters[cluster].len() - 1) as u32,
                        },
                    )
                }
                Item::Redirect {
                    namespace,
                    url,
                    title,
                    target,
                } => (
                    *namespace,
                    url,
                    title,
                    EntryKind::Redirect {
                        target: index_of[&(target.0, target.1.clone())],
                    },
                ),
            };
            dirents.push(
                DirEntry {
                    index: i as u32,
                    namespace,
                    url: url.clone(),
                    title: title.clone(),
                    revision: 0,
                    kind,
                    mime_type: None,
                    parameter: Vec::new(),
                }
                .to_bytes(),
            );
        }

        let raw_clusters: Vec<Vec<u8>> = clusters
            .iter()
            .map(|blobs| encode_cluster(self.cluster_info, blobs))
            .collect();

        // Layout: header | mimetypes | url ptrs | title ptrs | dirents |
        //         cluster ptrs | clusters | checksum
        let mut mime_list = Vec::new();
        for m in &mime_types {
            mime_list.extend_from_slice(m.as_bytes());
            mime_list.push(0);
        }
        mime_list.push(0);

        let n = self.items.len() as u64;
        let mime_list_pos = Header::SIZE as u64;
        let url_ptr_pos = mime_list_pos + mime_list.len() as u64;
        let title_ptr_pos = url_ptr_pos + 8 * n;
        let dirent_pos = title_ptr_pos + 4 * n;
        let dirents_len: u64 = dirents.iter().map(|d| d.len() as u64).sum();
        let cluster_ptr_pos = dirent_pos + dirents_len;
        let cluster_pos = cluster_ptr_pos + 8 * raw_clusters.len() as u64;
        let clusters_len: u64 = raw_clusters.iter().map(|c| c.len() as u64).sum();
        let checksum_pos = cluster_pos + clusters_len;

        let main_page = self
            .main_page
            .as_ref()
            .map(|(ns, url)| index_of[&(*ns, url.clone())])
            .unwrap_or(Header::NO_PAGE);

        let header = Header {
            major_version: self.major_version,
            minor_version: self.minor_version,
            uuid: [0x42; 16],
            entry_count: n as u32,
            cluster_count: raw_clusters.len() as u32,
            url_ptr_pos,
            title_ptr_pos,
            cluster_ptr_pos,
            mime_list_pos,
            main_page,
            layout_page: Header::NO_PAGE,
            checksum_pos,
        };

        let mut out = header.to_bytes();
        out.extend_from_slice(&mime_list);

        let mut pos = dirent_pos;
        for d in &dirents {
            out.extend_from_slice(&pos.to_le_bytes());
            pos += d.len() as u64;
        }
        for &t in &title_order {
            out.extend_from_slice(&t.to_le_bytes());
        }
        for d in &dirents {
            out.extend_from_slice(d);
        }

        let mut pos = cluster_pos;
        for c in &raw_clusters {
            out.extend_from_slice(&pos.to_le_bytes());
            pos += c.len() as u64;
        }
        for c in &raw_clusters {
            out.extend_from_slice(c);
        }
        out.extend_from_slice(&[0xAB; 16]);

        assert_eq!(out.len() as u64, checksum_pos + 16);
        out
    }
}

fn encode_cluster(info: u8, blobs: &[Vec<u8>]) -> Vec<u8> {
    let extended = info & 0x10 != 0;
    let width = if extended { 8 } else { 4 };

    let mut plain = Vec::new();
    let mut offset = ((blobs.len() + 1) * width) as u64;
    let mut offsets = vec![offset];
    for blob in blobs {
        offset += blob.len() as u64;
        offsets.push(offset);
    }
    for off in offsets {
        if extended {
            plain.extend_from_slice(&off.to_le_bytes());
        } else {
            plain.extend_from_slice(&(off as u32).to_le_bytes());
        }
    }
    for blob in blobs {
        plain.extend_from_slice(blob);
    }

    let payload = match info & 0x0F {
        2 => {
            let mut enc =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(&plain).unwrap();
            enc.finish().unwrap()
        }
        4 => {
            let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
            enc.write_all(&plain).unwrap();
            enc.finish().unwrap()
        }
        5 => zstd::stream::encode_all(plain.as_slice(), 3).unwrap(),
        // Stored, or a deliberately unknown tag
        _ => plain,
    };

    let mut raw = vec![info];
    raw.extend_from_slice(&payload);
    raw
}

/// Split `data` into `count` roughly equal in-memory parts.
pub fn split_parts(data: &[u8], count: usize) -> Vec<Arc<dyn ReadAt>> {
    let chunk = data.len().div_ceil(count.max(1)).max(1);
    data.chunks(chunk)
        .map(|c| Arc::new(MemoryReader::new(c.to_vec())) as Arc<dyn ReadAt>)
        .collect()
}

/// Deterministic pseudo-JPEG payload of `len` bytes.
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![
        255, 216, 255, 224, 0, 16, 74, 70, 73, 70, 0, 1, 1, 0, 0, 1,
    ];
    let mut x: u32 = 12345;
    while data.len() < len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        data.push((x >> 16) as u8);
    }
    data.truncate(len);
    data
}

/// A small encyclopedia shaped like the Ray Charles test archive.
pub fn sample_archive(cluster_info: u8) -> Vec<u8> {
    ArchiveBuilder::new(cluster_info)
        .content('-', "s/style.css", "", "text/css", "\n/* start site styles */ body {}")
        .content('-', "j/local.js", "", "application/javascript", "console.log( \"mw.loader\" );")
        .content(
            'A',
            "A_Fool_for_You.html",
            "A Fool for You",
            "text/html",
            "<html><h1 id=\"title\">A Fool for You</h1></html>",
        )
        .content('A', "A_Song_for_You.html", "A Song for You", "text/html", "<p>song</p>")
        .content('A', "Africa.html", "Africa", "text/html", "<p>africa</p>")
        .content(
            'A',
            "America_the_Beautiful.html",
            "America the Beautiful",
            "text/html",
            "<p>america</p>",
        )
        .redirect(
            'A',
            "America,_the_Beautiful.html",
            "America, the Beautiful",
            "A/America_the_Beautiful.html",
        )
        .content('A', "Atlantic_Records.html", "Atlantic Records", "text/html", "<p>label</p>")
        .content('A', "aardvark.html", "aardvark", "text/html", "<p>animal</p>")
        .content('A', "Blues.html", "Blues", "text/html", "<p>blues</p>")
        .content(
            'A',
            "Blues_Brothers_(film).html",
            "Blues Brothers (film)",
            "text/html",
            "<p>film</p>",
        )
        .content(
            'A',
            "Blues_Brothers_(soundtrack).html",
            "Blues Brothers (soundtrack)",
            "text/html",
            "<p>soundtrack</p>",
        )
        .content(
            'A',
            "Blues_Brothers_2000.html",
            "Blues Brothers 2000",
            "text/html",
            "<p>sequel</p>",
        )
        .content(
            'A',
            "Night_Time_Is_the_Right_Time.html",
            "Night Time Is the Right Time",
            "text/html",
            "<p>song</p>",
        )
        .redirect(
            'A',
            "(The_Night_Time_Is)_The_Right_Time.html",
            "(The Night Time Is) The Right Time",
            "A/Night_Time_Is_the_Right_Time.html",
        )
        .content('A', "The_Raelettes.html", "The Raelettes", "text/html", "<p>group</p>")
        .redirect('A', "Raelettes.html", "Raelettes", "A/The_Raelettes.html")
        .content('A', "Summary.html", "Summary", "text/html", "<p>Ray Charles summary</p>")
        .redirect('A', "Main_Page.html", "Main Page", "A/Summary.html")
        .content(
            'I',
            "m/RayCharles_AManAndHisSoul.jpg",
            "A Man and His Soul",
            "image/jpeg",
            jpeg_bytes(4951),
        )
        .content('M', "Language", "", "text/plain", "eng")
        .content('M', "Title", "", "text/plain", "Ray Charles")
        .content('M', "Creator", "", "text/plain", "Wikipedia")
        .main_page("A/Main_Page.html")
        .build()
}
