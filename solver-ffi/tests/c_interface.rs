//! C-interface tests: call the `extern "C"` functions directly from Rust,
//! going through the raw pointer and handle boundary.
//!
//! first QP:
//! min 3 x1^2 + 2 x2^2 - x1 - 4 x2
//! s.t. -1 <= x <= 1, x1 = 2 x2
//!
//! second QP:
//! min 4 x1^2 + 2 x2^2 - x1 - 4 x2
//! s.t. -1 <= x <= 2, x1 = 3 x2

#![allow(non_snake_case)]

use std::mem::MaybeUninit;
use std::ptr;

use proxip_ffi::*;

fn assert_near(actual: f64, expected: f64, tol: f64) {
    assert!((actual - expected).abs() <= tol, "expected {}, got {}", expected, actual);
}

unsafe fn read(ptr: *const f64, i: usize) -> f64 {
    *ptr.add(i)
}

unsafe fn check_result(work: *mut ProxipWorkspace, x: [f64; 2], y: f64) {
    let result = &*(*work).result;
    assert_eq!(result.info.status, PROXIP_SOLVED);
    assert_near(read(result.x, 0), x[0], 1e-6);
    assert_near(read(result.x, 1), x[1], 1e-6);
    assert_near(read(result.y, 0), y, 1e-6);
    for i in 0..2 {
        assert_near(read(result.z, i), 0.0, 1e-6);
        assert_near(read(result.z_lb, i), 0.0, 1e-6);
        assert_near(read(result.z_ub, i), 0.0, 1e-6);
    }
}

unsafe fn default_settings(dense: bool) -> ProxipSettings {
    let mut settings = MaybeUninit::<ProxipSettings>::uninit();
    if dense {
        proxip_set_default_settings_dense(settings.as_mut_ptr());
    } else {
        proxip_set_default_settings_sparse(settings.as_mut_ptr());
    }
    settings.assume_init()
}

#[test]
fn test_simple_dense_qp_with_update() {
    unsafe {
        let mut P = [6.0, 0.0, 0.0, 4.0];
        let c = [-1.0, -4.0];
        let mut A = [1.0, -2.0];
        let b = [0.0];
        let G = [1.0, 0.0, -1.0, 0.0];
        let mut h = [1.0, 1.0];
        let x_lb = [-PROXIP_INF, -1.0];
        let mut x_ub = [PROXIP_INF, 1.0];

        let mut settings = default_settings(true);
        settings.verbose = 1;

        let data = ProxipDataDense {
            n: 2,
            p: 1,
            m: 2,
            P: P.as_ptr(),
            c: c.as_ptr(),
            A: A.as_ptr(),
            b: b.as_ptr(),
            G: G.as_ptr(),
            h: h.as_ptr(),
            x_lb: x_lb.as_ptr(),
            x_ub: x_ub.as_ptr(),
        };

        let mut work: *mut ProxipWorkspace = ptr::null_mut();
        assert_eq!(proxip_setup_dense(&mut work, &data, &settings), PROXIP_OK);
        assert!(!work.is_null());
        assert_eq!((*(*work).result).info.status, PROXIP_UNSOLVED);

        assert_eq!(proxip_solve(work), PROXIP_SOLVED);
        check_result(work, [0.4285714, 0.2142857], -1.5714286);

        P[0] = 8.0;
        A[1] = -3.0;
        h[0] = 2.0;
        x_ub[1] = 2.0;

        let status = proxip_update_dense(
            work,
            P.as_ptr(),
            ptr::null(),
            A.as_ptr(),
            ptr::null(),
            ptr::null(),
            h.as_ptr(),
            ptr::null(),
            x_ub.as_ptr(),
        );
        assert_eq!(status, PROXIP_OK);
        assert_eq!(proxip_solve(work), PROXIP_SOLVED);
        check_result(work, [0.2763157, 0.0921056], -1.2105263);

        proxip_cleanup(work);
    }
}

#[test]
fn test_simple_sparse_qp_with_update() {
    unsafe {
        let mut P_x = [6.0, 4.0];
        let P_p = [0i64, 1, 2];
        let P_i = [0i64, 1];
        let c = [-1.0, -4.0];

        let mut A_x = [1.0, -2.0];
        let A_p = [0i64, 1, 2];
        let A_i = [0i64, 0];
        let b = [0.0];

        let G_x = [1.0, -1.0];
        let G_p = [0i64, 2, 2];
        let G_i = [0i64, 1];
        let mut h = [1.0, 1.0];

        let x_lb = [-PROXIP_INF, -1.0];
        let mut x_ub = [PROXIP_INF, 1.0];

        let mut settings = default_settings(false);
        settings.verbose = 1;

        let P = proxip_csc_matrix(2, 2, 2, P_p.as_ptr(), P_i.as_ptr(), P_x.as_ptr());
        let A = proxip_csc_matrix(1, 2, 2, A_p.as_ptr(), A_i.as_ptr(), A_x.as_ptr());
        let G = proxip_csc_matrix(2, 2, 2, G_p.as_ptr(), G_i.as_ptr(), G_x.as_ptr());

        let data = ProxipDataSparse {
            n: 2,
            p: 1,
            m: 2,
            P,
            c: c.as_ptr(),
            A,
            b: b.as_ptr(),
            G,
            h: h.as_ptr(),
            x_lb: x_lb.as_ptr(),
            x_ub: x_ub.as_ptr(),
        };

        let mut work: *mut ProxipWorkspace = ptr::null_mut();
        assert_eq!(proxip_setup_sparse(&mut work, &data, &settings), PROXIP_OK);
        assert_eq!(proxip_solve(work), PROXIP_SOLVED);
        check_result(work, [0.4285714, 0.2142857], -1.5714286);

        // The views point at the arrays, so editing them is enough.
        P_x[0] = 8.0;
        A_x[1] = -3.0;
        h[0] = 2.0;
        x_ub[1] = 2.0;

        let status =
            proxip_update_sparse(work, P, ptr::null(), A, ptr::null(), ptr::null(), h.as_ptr(), ptr::null(), x_ub.as_ptr());
        assert_eq!(status, PROXIP_OK);
        assert_eq!(proxip_solve(work), PROXIP_SOLVED);
        check_result(work, [0.2763157, 0.0921056], -1.2105263);

        proxip_cleanup(work);
        proxip_csc_free(P);
        proxip_csc_free(A);
        proxip_csc_free(G);
    }
}

#[test]
fn test_setup_errors() {
    unsafe {
        let P = [1.0];
        let x_lb = [1.0];
        let x_ub = [0.0];
        let data = ProxipDataDense {
            n: 1,
            p: 0,
            m: 0,
            P: P.as_ptr(),
            c: ptr::null(),
            A: ptr::null(),
            b: ptr::null(),
            G: ptr::null(),
            h: ptr::null(),
            x_lb: x_lb.as_ptr(),
            x_ub: x_ub.as_ptr(),
        };
        let mut work: *mut ProxipWorkspace = ptr::null_mut();
        assert_eq!(proxip_setup_dense(&mut work, &data, ptr::null()), PROXIP_ERR_BOUNDS);
        assert!(work.is_null());

        let mut settings = default_settings(true);
        settings.tau = 2.0;
        let ok_data = ProxipDataDense { x_lb: ptr::null(), x_ub: ptr::null(), ..data };
        assert_eq!(proxip_setup_dense(&mut work, &ok_data, &settings), PROXIP_INVALID_SETTINGS);

        // Sparse settings for a dense setup.
        let settings = default_settings(false);
        assert_eq!(proxip_setup_dense(&mut work, &ok_data, &settings), PROXIP_ERR_BACKEND);

        assert_eq!(proxip_setup_dense(ptr::null_mut(), &ok_data, ptr::null()), PROXIP_ERR_NULL_POINTER);
    }
}

#[test]
fn test_null_data_defaults() {
    unsafe {
        // min 1/2 x^2 - x with everything else left out: x = 1.
        let P = [1.0];
        let c = [-1.0];
        let data = ProxipDataDense {
            n: 1,
            p: 0,
            m: 0,
            P: P.as_ptr(),
            c: c.as_ptr(),
            A: ptr::null(),
            b: ptr::null(),
            G: ptr::null(),
            h: ptr::null(),
            x_lb: ptr::null(),
            x_ub: ptr::null(),
        };
        let mut work: *mut ProxipWorkspace = ptr::null_mut();
        assert_eq!(proxip_setup_dense(&mut work, &data, ptr::null()), PROXIP_OK);
        assert_eq!(proxip_solve(work), PROXIP_SOLVED);
        let result = &*(*work).result;
        assert_near(*result.x, 1.0, 1e-7);
        assert_eq!(*result.s_lb, PROXIP_INF);

        // A dense workspace rejects sparse updates.
        let status = proxip_update_sparse(
            work,
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
        );
        assert_eq!(status, PROXIP_ERR_BACKEND);

        // Iteration cap through the settings update.
        let mut settings = default_settings(true);
        settings.max_iter = 1;
        let c2 = [-5.0];
        assert_eq!(
            proxip_update_dense(
                work,
                ptr::null(),
                c2.as_ptr(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
                ptr::null()
            ),
            PROXIP_OK
        );
        assert_eq!(proxip_update_settings(work, &settings), PROXIP_OK);
        assert_eq!(proxip_solve(work), PROXIP_MAX_ITER_REACHED);
        assert_eq!((*(*work).result).info.iter, 1);

        proxip_cleanup(work);
    }
}

#[test]
fn test_structural_update_rejected() {
    unsafe {
        let P_x = [2.0, 2.0];
        let P_p = [0i64, 1, 2];
        let P_i = [0i64, 1];
        let P = ProxipCsc { m: 2, n: 2, nnz: 2, p: P_p.as_ptr(), i: P_i.as_ptr(), x: P_x.as_ptr() };
        let data = ProxipDataSparse {
            n: 2,
            p: 0,
            m: 0,
            P: &P,
            c: ptr::null(),
            A: ptr::null(),
            b: ptr::null(),
            G: ptr::null(),
            h: ptr::null(),
            x_lb: ptr::null(),
            x_ub: ptr::null(),
        };
        let mut work: *mut ProxipWorkspace = ptr::null_mut();
        assert_eq!(proxip_setup_sparse(&mut work, &data, ptr::null()), PROXIP_OK);

        let Q_x = [2.0, 1.0, 2.0];
        let Q_p = [0i64, 1, 3];
        let Q_i = [0i64, 0, 1];
        let Q = ProxipCsc { m: 2, n: 2, nnz: 3, p: Q_p.as_ptr(), i: Q_i.as_ptr(), x: Q_x.as_ptr() };
        let status = proxip_update_sparse(
            work,
            &Q,
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
            ptr::null(),
        );
        assert_eq!(status, PROXIP_ERR_STRUCTURE);

        // Unsolved workspace still solves on the original data: x = 0.
        assert_eq!(proxip_solve(work), PROXIP_SOLVED);
        let result = &*(*work).result;
        assert_near(*result.x, 0.0, 1e-7);
        proxip_cleanup(work);
    }
}
