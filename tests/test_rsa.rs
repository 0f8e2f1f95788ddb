use fingerprint_signatures::bigmath::ToBytesPadded;
use fingerprint_signatures::pkcs1::{self, HashAlgorithm};
use fingerprint_signatures::{Error, KeyGenOptions, KeyPair, PrivateKey, PublicKey};
use rsa::pkcs1::DecodeRsaPrivateKey as _;
use rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey};
use sha2::Digest as _;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn keypair(bits: usize) -> KeyPair {
    let mut rng = rand::thread_rng();
    KeyPair::generate(&mut rng, bits, &KeyGenOptions::default()).unwrap()
}

#[test]
fn test_textbook_fixture() {
    let big = |v: u32| BigUint::from(v);
    let sk = PrivateKey::new(big(3233), big(17), big(2753), big(61), big(53)).unwrap();
    let pk = sk.public_key();
    assert_eq!(pk.encrypt_int(&big(65)), big(2790));
    assert_eq!(big(2790).modpow(&big(2753), &big(3233)), big(65));

    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        assert_eq!(sk.decrypt_with_crt(&mut rng, &big(2790)).unwrap(), big(65));
    }
}

#[test]
fn test_encrypt_decrypt() {
    init_logger();
    let mut rng = rand::thread_rng();
    let kp = keypair(1024);
    let k = kp.pk.size();
    assert_eq!(k, 128);

    for len in [0, 1, 16, 100, k - 11].iter() {
        let msg: Vec<u8> = (0..*len).map(|i| i as u8).collect();
        let ct = pkcs1::encrypt(&mut rng, &msg, &kp.pk).unwrap();
        assert_eq!(ct.len(), k);
        assert_eq!(pkcs1::decrypt(&mut rng, &ct, &kp.sk).unwrap(), msg);
    }

    assert_eq!(
        pkcs1::encrypt(&mut rng, &vec![0u8; k - 10], &kp.pk).unwrap_err(),
        Error::MessageTooLong {
            len: k - 10,
            max: k - 11
        }
    );
}

#[test]
fn test_decrypt_failures_are_generic() {
    let mut rng = rand::thread_rng();
    let kp = keypair(512);
    let ct = pkcs1::encrypt(&mut rng, b"secret", &kp.pk).unwrap();

    let mut longer = vec![0u8];
    longer.extend_from_slice(&ct);
    assert_eq!(
        pkcs1::decrypt(&mut rng, &longer, &kp.sk).unwrap_err(),
        Error::DecryptionFailed
    );

    let mut tampered = ct.clone();
    tampered[10] ^= 0x40;
    assert_eq!(
        pkcs1::decrypt(&mut rng, &tampered, &kp.sk).unwrap_err(),
        Error::DecryptionFailed
    );

    // a correctly formed signature block is not a valid encryption block
    let sig = pkcs1::sign(&mut rng, b"m", &kp.sk, HashAlgorithm::Sha1).unwrap();
    let block = kp.pk.encrypt_int(&BigUint::from_bytes_be(&sig));
    let ct = kp.pk.encrypt_int(&block).to_bytes_be_padded(kp.pk.size());
    assert_eq!(
        pkcs1::decrypt(&mut rng, &ct, &kp.sk).unwrap_err(),
        Error::DecryptionFailed
    );
}

#[test]
fn test_sign_verify_all_hashes() {
    init_logger();
    let mut rng = rand::thread_rng();
    let kp = keypair(1024);
    let msg = b"quarterly-report.xlsx|48211|1714557600";

    for &hash in HashAlgorithm::ALL.iter() {
        let sig = pkcs1::sign(&mut rng, msg, &kp.sk, hash).unwrap();
        assert_eq!(sig.len(), 128);
        assert_eq!(pkcs1::verify(msg, &sig, &kp.pk).unwrap(), hash);
        assert_eq!(pkcs1::find_signature_hash(&sig, &kp.pk).unwrap(), hash);

        for pos in [0, 1, 64, 127].iter() {
            let mut tampered = sig.to_vec();
            tampered[*pos] ^= 0x01;
            assert_eq!(
                pkcs1::verify(msg, &tampered, &kp.pk).unwrap_err(),
                Error::VerificationFailed
            );
        }
        assert_eq!(
            pkcs1::verify(b"another message", &sig, &kp.pk).unwrap_err(),
            Error::VerificationFailed
        );
        assert_eq!(
            pkcs1::verify(msg, &sig[1..], &kp.pk).unwrap_err(),
            Error::VerificationFailed
        );
    }
}

#[test]
fn test_sign_hash() {
    let mut rng = rand::thread_rng();
    let kp = keypair(1024);
    let digest = pkcs1::compute_hash(b"payload", HashAlgorithm::Sha384);
    let sig = pkcs1::sign_hash(&mut rng, &digest, &kp.sk, HashAlgorithm::Sha384).unwrap();
    assert_eq!(
        sig,
        pkcs1::sign(&mut rng, b"payload", &kp.sk, HashAlgorithm::Sha384).unwrap()
    );
    assert_eq!(
        pkcs1::sign_hash(&mut rng, &digest, &kp.sk, HashAlgorithm::Sha256).unwrap_err(),
        Error::InvalidInput
    );
}

#[test]
fn test_key_too_small_for_hash() {
    let mut rng = rand::thread_rng();
    let kp = keypair(512);
    assert!(matches!(
        pkcs1::sign(&mut rng, b"x", &kp.sk, HashAlgorithm::Sha512),
        Err(Error::MessageTooLong { .. })
    ));
}

#[test]
fn test_interop_with_rsa_crate() {
    let mut rng = rand::thread_rng();
    let kp = keypair(1024);
    let rsa_sk = RsaPrivateKey::from_pkcs1_der(&kp.sk.to_pkcs1_der().unwrap()).unwrap();
    let rsa_pk = rsa_sk.to_public_key();
    let msg = b"interop";

    let ct = pkcs1::encrypt(&mut rng, msg, &kp.pk).unwrap();
    assert_eq!(rsa_sk.decrypt(Pkcs1v15Encrypt, &ct).unwrap(), msg);
    let ct = rsa_pk.encrypt(&mut rng, Pkcs1v15Encrypt, msg).unwrap();
    assert_eq!(pkcs1::decrypt(&mut rng, &ct, &kp.sk).unwrap(), msg);

    let digest = sha2::Sha256::digest(msg);
    let sig = pkcs1::sign(&mut rng, msg, &kp.sk, HashAlgorithm::Sha256).unwrap();
    rsa_pk
        .verify(Pkcs1v15Sign::new::<sha2::Sha256>(), &digest, &sig)
        .unwrap();
    let theirs = rsa_sk
        .sign(Pkcs1v15Sign::new::<sha2::Sha256>(), &digest)
        .unwrap();
    assert_eq!(theirs, sig.to_vec());

    let digest = sha2::Sha512::digest(msg);
    let theirs = rsa_sk
        .sign(Pkcs1v15Sign::new::<sha2::Sha512>(), &digest)
        .unwrap();
    assert_eq!(
        pkcs1::verify(msg, &theirs, &kp.pk).unwrap(),
        HashAlgorithm::Sha512
    );
}

#[test]
fn test_crt_matches_direct_on_many_keys() {
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let kp = keypair(256);
        let m = BigUint::from_bytes_be(b"fingerprint");
        let c = kp.pk.encrypt_int(&m);
        let direct = kp.sk.direct_exponentiate(&c);
        assert_eq!(direct, m);
        assert_eq!(kp.sk.crt_exponentiate(&c), direct);
        assert_eq!(kp.sk.decrypt_with_crt(&mut rng, &c).unwrap(), direct);
    }
}

#[test]
fn test_key_serialization() {
    let kp = keypair(1024);

    let pk = PublicKey::from_pkcs1_der(&kp.pk.to_pkcs1_der().unwrap()).unwrap();
    assert_eq!(pk, kp.pk);
    let sk = PrivateKey::from_pkcs1_pem(&kp.sk.to_pkcs1_pem().unwrap()).unwrap();
    assert_eq!(sk, kp.sk);
    assert_eq!(sk.exp1(), kp.sk.exp1());
    assert_eq!(sk.coef(), kp.sk.coef());

    #[cfg(feature = "serde")]
    {
        let json = serde_json::to_string(&kp.pk).unwrap();
        let pk: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, kp.pk);
    }
}
