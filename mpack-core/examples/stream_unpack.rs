use std::io::Read;

use mpack_core::Unpacker;

fn main() {
    let mut stdin = std::io::stdin();
    let mut unp = Unpacker::new();

    loop {
        unp.reserve(32 * 1024);
        let target = unp.write_target();
        let n = stdin.read(target).unwrap();
        if n == 0 {
            break;
        }
        unp.commit(n);

        loop {
            match unp.try_next() {
                Ok(Some(value)) => println!("VALUE: {:?}", value.get()),
                Ok(None) => break,
                Err(e) => {
                    eprintln!("error after {} bytes: {}", unp.parsed_size(), e);
                    return;
                }
            }
        }
    }

    if unp.pending_len() > 0 {
        eprintln!("{} trailing bytes left undecoded", unp.pending_len());
    }
}
