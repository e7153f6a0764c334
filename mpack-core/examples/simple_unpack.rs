use mpack_core::{unpack, Packer, UnpackLimits, ValueView, Zone};

fn main() {
    let mut p = Packer::new();
    p.map_header(3);
    p.str("name");
    p.str("simple");
    p.str("counts");
    p.array_header(3);
    p.uint(1);
    p.uint(2);
    p.uint(3);
    p.str("pi");
    p.f64(3.14159);

    let encoded = p.into_vec();
    println!("encoded {} bytes: {:02x?}", encoded.len(), encoded);

    let mut zone = Zone::new();
    let (root, consumed) = unpack(&encoded, &mut zone, &UnpackLimits::default()).unwrap();
    println!("decoded ({} bytes): {:?}", consumed, ValueView::new(&zone, None, root));
}
