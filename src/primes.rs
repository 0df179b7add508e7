/// Trial division primality test with a 2/3 wheel.
///
/// Rejects multiples of 2 and 3 up front, then only tries divisors of the
/// form 6k-1 and 6k+1 (5, 7, 11, 13, ...) up to and including floor(sqrt(n)).
/// - No shared state, safe to call from any number of workers
/// - Time complexity: O(sqrt(n) / 3)
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 || n == 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    let limit = n.isqrt();
    let mut i = 5;
    while i <= limit {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Odd-only Sieve of Eratosthenes, single-threaded.
///
/// Used as the reference scan that concurrent runs are checked against.
/// - Index mapping: is_prime[i] represents the number (2*i + 3)
/// - Returns primes in increasing order
pub fn find_primes_reference(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return vec![];
    }
    if limit == 2 {
        return vec![2];
    }

    let mut primes = vec![2];

    // Array size is half since we only track odd numbers
    let size = ((limit - 1) / 2) as usize;
    let mut is_prime = vec![true; size];

    let sqrt_index = ((limit.isqrt() - 1) / 2) as usize;

    for i in 0..=sqrt_index.min(size - 1) {
        if is_prime[i] {
            let p = 2 * i + 3;
            let mut j = (p * p - 3) / 2;
            while j < size {
                is_prime[j] = false;
                j += p;
            }
        }
    }

    for (i, &is_p) in is_prime.iter().enumerate() {
        if is_p {
            primes.push(2 * i as u64 + 3);
        }
    }

    primes
}
