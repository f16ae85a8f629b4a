#![no_main]

use dbprobe::report::{render, DatabaseListing, TlsStatus};
use dbprobe::Error;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    // Split the input into database names, cipher and error text.
    let mut parts = text.split('\n');
    let cipher = parts.next();
    let error = parts.next().unwrap_or_default().to_string();
    let listing: DatabaseListing = parts.collect();

    let tls = TlsStatus::from_cipher(cipher);
    for report in [
        render("MySQL", &Ok(listing), &tls),
        render("MySQL", &Err(Error::Query(error)), &tls),
    ] {
        // Only the fixed tags may contain markup characters.
        let stripped = report
            .replace("<h2>", "")
            .replace("</h2>", "")
            .replace("<h3>", "")
            .replace("</h3>", "")
            .replace("<p>", "")
            .replace("</p>", "")
            .replace("<ul>", "")
            .replace("</ul>", "")
            .replace("<li>", "")
            .replace("</li>", "");
        assert!(!stripped.contains('<'), "unescaped markup in {:?}", report);
        assert!(!stripped.contains('>'), "unescaped markup in {:?}", report);
    }
});
