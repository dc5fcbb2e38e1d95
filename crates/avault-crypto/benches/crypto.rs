use avault_crypto::{open_avatar, seal_avatar, ProfileKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_seal_avatar(bencher: divan::Bencher, size: usize) {
    let key = ProfileKey::from_bytes([0xABu8; 32]);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| seal_avatar(divan::black_box(&data), divan::black_box(&key)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_open_avatar(bencher: divan::Bencher, size: usize) {
    let key = ProfileKey::from_bytes([0xABu8; 32]);
    let data = make_data(size);
    let sealed = seal_avatar(&data, &key).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            open_avatar(
                divan::black_box(&sealed.ciphertext),
                divan::black_box(&key),
            )
            .unwrap()
        });
}

fn main() {
    divan::main();
}
