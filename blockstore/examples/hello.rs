use blockstore::{BlockStore, StoreConfig};

pub fn main() {
    let config = StoreConfig::default()
        .with_total_blocks(64)
        .with_block_size(512);
    let mut store = BlockStore::create(config.clone()).expect("should create");

    let id = store.allocate().unwrap();
    store.write(id, &[b'h'; 512]).unwrap();

    let image = tempfile::NamedTempFile::new().unwrap();
    store.serialize(image.path()).unwrap();

    let loaded = BlockStore::deserialize_with(image.path(), config).unwrap();
    println!(
        "block {} reloaded, {} of {} blocks in use",
        id,
        loaded.used_blocks(),
        loaded.total_blocks()
    );
}
